use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the root directory used by the launcher.
pub fn default_app_dir() -> PathBuf {
    let base = match env::consts::OS {
        "windows" => env::var_os("LOCALAPPDATA")
            .or_else(|| env::var_os("APPDATA"))
            .map(PathBuf::from),
        "macos" => env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| home.join("Library").join("Application Support")),
        _ => env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| home.join(".local").join("share")),
    }
    .unwrap_or_else(|| PathBuf::from("."));

    base.join("stereomix-launcher")
}

/// Resolve a configured path against `base` unless it is already absolute.
pub fn resolve(base: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        base.join(configured)
    }
}

/// Temp location for downloaded archives.
pub fn temp_path(file_name: &Path) -> PathBuf {
    resolve(&env::temp_dir(), file_name)
}

pub fn ensure_app_dir(app_dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(app_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_paths_against_base() {
        let base = Path::new("/data/launcher");
        assert_eq!(
            resolve(base, Path::new("StereoMix")),
            PathBuf::from("/data/launcher/StereoMix")
        );
    }

    #[cfg(unix)]
    #[test]
    fn keeps_absolute_paths() {
        let base = Path::new("/data/launcher");
        assert_eq!(
            resolve(base, Path::new("/opt/game")),
            PathBuf::from("/opt/game")
        );
    }

    #[test]
    fn temp_paths_live_in_os_temp_dir() {
        let path = temp_path(Path::new("StereoMix.zip"));
        assert!(path.starts_with(env::temp_dir()));
        assert!(path.ends_with("StereoMix.zip"));
    }
}
