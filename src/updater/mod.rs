use std::path::PathBuf;

/// Launcher version compiled into this binary.
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Where the launcher's own update comes from and goes to.
#[derive(Clone, Debug)]
pub struct SelfUpdateTarget {
    pub current_version: String,
    /// The downloaded installer lands here and is started from here.
    pub installer_path: PathBuf,
}

impl SelfUpdateTarget {
    /// Whether `remote_tag` names the running launcher version.
    pub fn is_current(&self, remote_tag: &str) -> bool {
        normalize_version(&self.current_version) == normalize_version(remote_tag)
    }
}

/// Normalize version string by removing 'v' prefix and cleaning up.
fn normalize_version(version: &str) -> String {
    version.trim().trim_start_matches('v').to_owned()
}
