use std::path::Path;
use std::process::Stdio;

use log::{debug, info, warn};
use tokio::process::{Child, Command};

#[derive(Clone, Default)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    pub fn new() -> Self {
        Self
    }

    /// Start `path` as an independent process.
    ///
    /// Dropping the returned handle does not stop the child.
    pub fn launch(&self, path: &Path) -> Result<Child, String> {
        if !path.exists() {
            warn!("launch: executable not found at {}", path.display());
            return Err(format!("executable not found at {}", path.display()));
        }

        let mut cmd = Command::new(path);
        if let Some(dir) = path.parent() {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());

        let child = cmd
            .spawn()
            .map_err(|e| format!("failed to start {}: {e}", path.display()))?;
        info!(
            "launch: started {} (pid {:?})",
            path.display(),
            child.id()
        );
        Ok(child)
    }

    /// Start `path`, call `on_launched`, then wait for it and hand the exit code
    /// to `on_exited`.
    pub async fn launch_and_wait<L, E>(
        &self,
        path: &Path,
        on_launched: L,
        on_exited: E,
    ) -> Result<(), String>
    where
        L: FnOnce(),
        E: FnOnce(Option<i32>),
    {
        let mut child = self.launch(path)?;
        on_launched();
        let code = match child.wait().await {
            Ok(status) => status.code(),
            Err(err) => {
                warn!("launch: lost track of {}: {err}", path.display());
                None
            }
        };
        debug!("launch: {} exited with {:?}", path.display(), code);
        on_exited(code);
        Ok(())
    }
}
