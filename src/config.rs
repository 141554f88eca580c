use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Deserialize;

use crate::engine::channel::{ArchiveTarget, ChannelSpec, Target};
use crate::engine::models::TagField;
use crate::env;
use crate::networking::DEFAULT_USER_AGENT;
use crate::updater::SelfUpdateTarget;

pub const CONFIG_FILE: &str = "launcher.json";
const EMBEDDED_CONFIG: &str = include_str!("../launcher.json");

#[derive(Debug, Clone, Deserialize)]
pub struct LauncherConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Keep the launcher out of the way while the game runs.
    #[serde(default = "default_true")]
    pub hide_while_running: bool,
    pub launcher: SelfUpdateConfig,
    pub game: GameChannelConfig,
    #[serde(default)]
    pub dev: Option<GameChannelConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameChannelConfig {
    pub endpoint: String,
    #[serde(default = "default_tag_field")]
    pub tag_field: TagField,
    #[serde(default = "default_archive_extension")]
    pub asset_extension: String,
    pub install_dir: PathBuf,
    pub version_file: PathBuf,
    /// Relative to `install_dir`.
    pub executable: PathBuf,
    pub temp_archive: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelfUpdateConfig {
    pub endpoint: String,
    #[serde(default = "default_tag_field")]
    pub tag_field: TagField,
    #[serde(default = "default_installer_extension")]
    pub asset_extension: String,
    pub installer_file: PathBuf,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_owned()
}

fn default_true() -> bool {
    true
}

fn default_tag_field() -> TagField {
    TagField::TagName
}

fn default_archive_extension() -> String {
    ".zip".into()
}

fn default_installer_extension() -> String {
    ".exe".into()
}

impl LauncherConfig {
    /// Read `launcher.json` from `app_dir`, falling back to the compiled-in copy.
    pub fn load(app_dir: &Path) -> Result<Self, String> {
        let path = app_dir.join(CONFIG_FILE);
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    info!("config: loaded {}", path.display());
                    return Ok(config);
                }
                Err(err) => warn!("config: ignoring {}: {err}", path.display()),
            },
            Err(err) => info!(
                "config: no {} ({err}); using embedded defaults",
                path.display()
            ),
        }
        Self::embedded()
    }

    pub fn embedded() -> Result<Self, String> {
        Self::parse(EMBEDDED_CONFIG)
    }

    pub fn parse(contents: &str) -> Result<Self, String> {
        serde_json::from_str(contents).map_err(|e| format!("launcher.json parse error: {e}"))
    }
}

impl GameChannelConfig {
    pub fn spec(&self, app_dir: &Path, hide_while_running: bool) -> ChannelSpec {
        let install_dir = env::resolve(app_dir, &self.install_dir);
        let executable = install_dir.join(&self.executable);
        ChannelSpec {
            endpoint: self.endpoint.clone(),
            tag_field: self.tag_field,
            asset_extension: self.asset_extension.clone(),
            target: Target::Archive(ArchiveTarget {
                version_file: env::resolve(app_dir, &self.version_file),
                executable,
                install_dir,
                temp_archive: env::temp_path(&self.temp_archive),
                wait_for_exit: hide_while_running,
            }),
        }
    }
}

impl SelfUpdateConfig {
    pub fn spec(&self, app_dir: &Path, current_version: &str) -> ChannelSpec {
        ChannelSpec {
            endpoint: self.endpoint.clone(),
            tag_field: self.tag_field,
            asset_extension: self.asset_extension.clone(),
            target: Target::SelfUpdate(SelfUpdateTarget {
                current_version: current_version.to_owned(),
                installer_path: env::resolve(app_dir, &self.installer_file),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_config_parses() {
        let config = LauncherConfig::embedded().unwrap();
        assert_eq!(config.game.asset_extension, ".zip");
        assert_eq!(config.launcher.asset_extension, ".exe");
        assert!(config.dev.is_some());
        assert!(!config.user_agent.is_empty());
    }

    #[test]
    fn applies_defaults_for_optional_fields() {
        let config = LauncherConfig::parse(
            r#"{
                "launcher": {"endpoint": "http://l", "installer_file": "setup.exe"},
                "game": {
                    "endpoint": "http://g",
                    "tag_field": "versionName",
                    "install_dir": "Game",
                    "version_file": "game.json",
                    "executable": "Game.exe",
                    "temp_archive": "Game.zip"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert!(config.hide_while_running);
        assert!(config.dev.is_none());
        assert_eq!(config.game.tag_field, TagField::VersionName);
        assert_eq!(config.game.asset_extension, ".zip");
        assert_eq!(config.launcher.tag_field, TagField::TagName);
    }

    #[test]
    fn local_file_overrides_embedded_copy() {
        let dir = tempfile::tempdir().unwrap();
        let custom = EMBEDDED_CONFIG.replace("\"hide_while_running\": true", "\"hide_while_running\": false");
        fs::write(dir.path().join(CONFIG_FILE), custom).unwrap();

        let config = LauncherConfig::load(dir.path()).unwrap();
        assert!(!config.hide_while_running);
    }

    #[test]
    fn malformed_local_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{ nope").unwrap();

        let config = LauncherConfig::load(dir.path()).unwrap();
        assert!(config.hide_while_running);
    }

    #[test]
    fn resolves_channel_paths() {
        let config = LauncherConfig::embedded().unwrap();
        let app_dir = Path::new("/data/launcher");
        let spec = config.game.spec(app_dir, true);
        let Target::Archive(target) = spec.target else {
            panic!("game channel must install archives");
        };
        assert_eq!(target.install_dir, app_dir.join("StereoMix"));
        assert_eq!(target.executable, app_dir.join("StereoMix").join("StereoMix.exe"));
        assert_eq!(target.version_file, app_dir.join("StereoMix.version.json"));
        assert!(target.temp_archive.starts_with(std::env::temp_dir()));
    }
}
