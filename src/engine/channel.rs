use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::engine::models::{Release, ReleaseAsset, TagField};
use crate::engine::state::{ChannelId, ChannelState, EngineEvent};
use crate::installer::{self, ArchiveKind, Installer};
use crate::networking::{self, DownloadProgress, NetworkClient};
use crate::process::ProcessLauncher;
use crate::storage::VersionStore;
use crate::updater::SelfUpdateTarget;

/// A game build that is installed by unpacking an archive.
#[derive(Clone, Debug)]
pub struct ArchiveTarget {
    pub install_dir: PathBuf,
    pub version_file: PathBuf,
    pub executable: PathBuf,
    pub temp_archive: PathBuf,
    /// Wait for the game to exit and re-check afterwards.
    pub wait_for_exit: bool,
}

#[derive(Clone, Debug)]
pub enum Target {
    Archive(ArchiveTarget),
    SelfUpdate(SelfUpdateTarget),
}

/// Everything that distinguishes one channel from another.
#[derive(Clone, Debug)]
pub struct ChannelSpec {
    pub endpoint: String,
    pub tag_field: TagField,
    pub asset_extension: String,
    pub target: Target,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The game ran (and, when waited on, exited again).
    Launched,
    Installed { tag: String },
    /// The launcher installer is running; this process should exit.
    HandOff { installer: PathBuf },
    /// Nothing to do right now.
    Idle,
    /// The trigger was disabled.
    Refused,
    Failed,
}

#[derive(Debug)]
enum Decision {
    NotInstalled,
    UpToDate { tag: String },
    UpdateAvailable { local: String, release: Release },
}

impl Decision {
    fn state(&self) -> ChannelState {
        match self {
            Decision::NotInstalled => ChannelState::NotInstalled,
            Decision::UpToDate { tag } => ChannelState::UpToDate { tag: tag.clone() },
            Decision::UpdateAvailable { local, release } => ChannelState::UpdateAvailable {
                local: local.clone(),
                remote: release.tag.clone(),
            },
        }
    }
}

/// Install / update / launch state machine for one channel.
pub struct ChannelController {
    id: ChannelId,
    spec: ChannelSpec,
    network: NetworkClient,
    store: VersionStore,
    installer: Installer,
    process: ProcessLauncher,
    state: ChannelState,
    updates: mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelController {
    pub fn new(
        id: ChannelId,
        spec: ChannelSpec,
        network: NetworkClient,
        updates: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        let store = VersionStore::new(spec.tag_field);
        Self {
            id,
            spec,
            network,
            store,
            installer: Installer::new(),
            process: ProcessLauncher::new(),
            state: ChannelState::Unknown,
            updates,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    pub fn set_state(&mut self, state: ChannelState) {
        debug!("channel {}: {:?}", self.id, state);
        self.state = state.clone();
        let _ = self.updates.send(EngineEvent::State {
            channel: self.id,
            state,
        });
    }

    fn report_error(&self, message: String) {
        error!("channel {}: {}", self.id, message);
        let _ = self.updates.send(EngineEvent::Error {
            channel: self.id,
            message,
        });
    }

    /// Installed tag, or `None` when the channel counts as not installed.
    async fn local_tag(&self) -> Option<String> {
        match &self.spec.target {
            Target::Archive(target) => {
                if !target.version_file.exists() || !target.executable.exists() {
                    debug!(
                        "channel {}: version file or executable missing",
                        self.id
                    );
                    return None;
                }
                self.store.read(&target.version_file).await
            }
            Target::SelfUpdate(target) => Some(target.current_version.clone()),
        }
    }

    fn tags_match(&self, local: &str, remote: &str) -> bool {
        match &self.spec.target {
            Target::Archive(_) => local == remote,
            Target::SelfUpdate(target) => target.is_current(remote),
        }
    }

    async fn fetch_release(&self) -> Result<Release, String> {
        self.network
            .fetch_release(&self.spec.endpoint, self.spec.tag_field)
            .await
            .map_err(|e| format!("failed to get latest {} version: {e}", self.id))
    }

    async fn evaluate(&self) -> Result<Decision, String> {
        let Some(local) = self.local_tag().await else {
            return Ok(Decision::NotInstalled);
        };
        let release = self.fetch_release().await?;
        if self.tags_match(&local, &release.tag) {
            Ok(Decision::UpToDate { tag: local })
        } else {
            Ok(Decision::UpdateAvailable { local, release })
        }
    }

    /// Refresh the displayed state. On failure the previous state is kept.
    pub async fn check(&mut self) -> bool {
        let previous = self.state.clone();
        self.set_state(ChannelState::Checking);
        match self.evaluate().await {
            Ok(decision) => {
                info!("channel {}: {:?}", self.id, decision.state());
                self.set_state(decision.state());
                true
            }
            Err(err) => {
                self.report_error(err);
                self.set_state(previous);
                false
            }
        }
    }

    /// The user's trigger action: install, update or launch.
    pub async fn trigger(&mut self) -> TriggerOutcome {
        if !self.state.is_actionable() {
            warn!(
                "channel {}: trigger ignored while {:?}",
                self.id, self.state
            );
            return TriggerOutcome::Refused;
        }

        let previous = self.state.clone();
        self.set_state(ChannelState::Checking);
        let decision = match self.evaluate().await {
            Ok(decision) => decision,
            Err(err) => {
                self.report_error(err);
                self.set_state(previous);
                return TriggerOutcome::Failed;
            }
        };

        match decision {
            Decision::UpToDate { tag } => self.launch(tag).await,
            Decision::UpdateAvailable { release, .. } => self.deploy(release).await,
            Decision::NotInstalled => match self.fetch_release().await {
                Ok(release) => self.deploy(release).await,
                Err(err) => {
                    self.report_error(err);
                    self.set_state(ChannelState::NotInstalled);
                    TriggerOutcome::Failed
                }
            },
        }
    }

    async fn launch(&mut self, tag: String) -> TriggerOutcome {
        let Target::Archive(target) = self.spec.target.clone() else {
            // The running launcher is the current one; nothing to start.
            self.set_state(ChannelState::UpToDate { tag });
            return TriggerOutcome::Idle;
        };

        if !target.wait_for_exit {
            return match self.process.launch(&target.executable) {
                Ok(_child) => {
                    let _ = self.updates.send(EngineEvent::Launched { channel: self.id });
                    self.set_state(ChannelState::UpToDate { tag });
                    TriggerOutcome::Launched
                }
                Err(err) => {
                    self.report_error(err);
                    self.set_state(ChannelState::UpToDate { tag });
                    TriggerOutcome::Failed
                }
            };
        }

        self.set_state(ChannelState::Running);
        let id = self.id;
        let updates = self.updates.clone();
        let launched = self
            .process
            .launch_and_wait(
                &target.executable,
                || {
                    let _ = updates.send(EngineEvent::Launched { channel: id });
                },
                |code| {
                    info!("channel {id}: game exited with {code:?}");
                    let _ = updates.send(EngineEvent::Exited { channel: id, code });
                },
            )
            .await;

        match launched {
            Ok(()) => {
                // The install may have changed while the game was running.
                if !self.check().await {
                    self.set_state(ChannelState::UpToDate { tag });
                }
                TriggerOutcome::Launched
            }
            Err(err) => {
                self.report_error(err);
                self.set_state(ChannelState::UpToDate { tag });
                TriggerOutcome::Failed
            }
        }
    }

    async fn deploy(&mut self, release: Release) -> TriggerOutcome {
        let Some(asset) = release.asset_for(&self.spec.asset_extension).cloned() else {
            self.report_error(format!(
                "release {} has no asset ending with {}",
                release.tag, self.spec.asset_extension
            ));
            let state = self.retry_state(&release).await;
            self.set_state(state);
            return TriggerOutcome::Failed;
        };

        match self.spec.target.clone() {
            Target::Archive(target) => self.install_archive(&target, release, asset).await,
            Target::SelfUpdate(target) => self.install_launcher(&target, release, asset).await,
        }
    }

    async fn install_archive(
        &mut self,
        target: &ArchiveTarget,
        release: Release,
        asset: ReleaseAsset,
    ) -> TriggerOutcome {
        let result = self.download_and_install(target, &release, &asset).await;

        if target.temp_archive.exists() {
            if let Err(err) = tokio::fs::remove_file(&target.temp_archive).await {
                warn!(
                    "channel {}: failed to remove {}: {err}",
                    self.id,
                    target.temp_archive.display()
                );
            }
        }

        match result {
            Ok(()) => {
                info!("channel {}: installed {}", self.id, release.tag);
                self.set_state(ChannelState::Ready {
                    tag: release.tag.clone(),
                });
                if !self.check().await {
                    let state = self.retry_state(&release).await;
                    self.set_state(state);
                }
                TriggerOutcome::Installed { tag: release.tag }
            }
            Err(err) => {
                self.report_error(err);
                let state = self.retry_state(&release).await;
                self.set_state(state);
                TriggerOutcome::Failed
            }
        }
    }

    async fn download_and_install(
        &mut self,
        target: &ArchiveTarget,
        release: &Release,
        asset: &ReleaseAsset,
    ) -> Result<(), String> {
        self.download(&asset.download_url, &target.temp_archive, &release.tag)
            .await?;
        if let Some(expected) = asset.sha256() {
            networking::verify_sha256(&target.temp_archive, expected)?;
        }

        self.set_state(ChannelState::Installing {
            tag: release.tag.clone(),
        });
        let installer = self.installer;
        let archive = target.temp_archive.clone();
        let kind = ArchiveKind::from_name(asset.file_name());
        let install_dir = target.install_dir.clone();
        tokio::task::spawn_blocking(move || installer.replace(&archive, kind, &install_dir))
            .await
            .map_err(|e| format!("install task failed: {e}"))??;

        if !target.executable.exists() {
            return Err(format!(
                "release {} does not contain {}",
                release.tag,
                target.executable.display()
            ));
        }
        installer::mark_executable(&target.executable);

        self.store.write(&target.version_file, &release.raw).await
    }

    async fn install_launcher(
        &mut self,
        target: &SelfUpdateTarget,
        release: Release,
        asset: ReleaseAsset,
    ) -> TriggerOutcome {
        let path = target.installer_path.clone();
        let mut result = self.download(&asset.download_url, &path, &release.tag).await;
        if result.is_ok()
            && let Some(expected) = asset.sha256()
        {
            result = networking::verify_sha256(&path, expected);
            if result.is_err()
                && let Err(err) = tokio::fs::remove_file(&path).await
            {
                warn!(
                    "channel {}: failed to remove {}: {err}",
                    self.id,
                    path.display()
                );
            }
        }
        if let Err(err) = result {
            self.report_error(err);
            let state = self.retry_state(&release).await;
            self.set_state(state);
            return TriggerOutcome::Failed;
        }

        installer::mark_executable(&path);
        match self.process.launch(&path) {
            Ok(_child) => {
                info!("channel {}: handing off to {}", self.id, path.display());
                self.set_state(ChannelState::HandingOff);
                let _ = self.updates.send(EngineEvent::HandOff {
                    installer: path.clone(),
                });
                TriggerOutcome::HandOff { installer: path }
            }
            Err(err) => {
                self.report_error(err);
                let state = self.retry_state(&release).await;
                self.set_state(state);
                TriggerOutcome::Failed
            }
        }
    }

    async fn download(&mut self, url: &str, dest: &Path, tag: &str) -> Result<(), String> {
        self.set_state(ChannelState::Downloading {
            tag: tag.to_owned(),
            downloaded: 0,
            total: 1,
            progress: 0.0,
            speed: 0.0,
        });

        let id = self.id;
        let updates = self.updates.clone();
        let mut last = None;
        let result = self
            .network
            .download_to_path(url, dest, |p: DownloadProgress| {
                let state = ChannelState::Downloading {
                    tag: tag.to_owned(),
                    downloaded: p.downloaded,
                    total: p.total,
                    progress: p.percent,
                    speed: p.speed,
                };
                last = Some(state.clone());
                let _ = updates.send(EngineEvent::State { channel: id, state });
            })
            .await;
        if let Some(state) = last {
            self.state = state;
        }
        result
    }

    /// A state the user can retry from, derived from what is on disk now.
    async fn retry_state(&self, release: &Release) -> ChannelState {
        match self.local_tag().await {
            None => ChannelState::NotInstalled,
            Some(local) if self.tags_match(&local, &release.tag) => {
                ChannelState::UpToDate { tag: local }
            }
            Some(local) => ChannelState::UpdateAvailable {
                local,
                remote: release.tag.clone(),
            },
        }
    }
}
