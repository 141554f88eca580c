use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{Mutex, mpsc};

use crate::config::LauncherConfig;
use crate::engine::channel::{ChannelController, ChannelSpec, TriggerOutcome};
use crate::engine::state::{ChannelId, ChannelState, EngineEvent, UserAction};
use crate::networking::NetworkClient;
use crate::updater;

pub mod channel;
pub mod models;
pub mod state;

type SharedChannel = Arc<Mutex<ChannelController>>;

/// Owns every channel and decides which of them may act.
///
/// A stale launcher takes precedence: while its update is pending the game
/// channels are shown as blocked and their triggers are refused.
pub struct LauncherEngine {
    launcher: SharedChannel,
    game: SharedChannel,
    dev: Option<SharedChannel>,
    updates: mpsc::UnboundedSender<EngineEvent>,
}

impl LauncherEngine {
    pub fn new(
        config: &LauncherConfig,
        app_dir: &Path,
        updates: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        Self::from_specs(
            config.launcher.spec(app_dir, updater::CURRENT_VERSION),
            config.game.spec(app_dir, config.hide_while_running),
            config
                .dev
                .as_ref()
                .map(|dev| dev.spec(app_dir, config.hide_while_running)),
            NetworkClient::new(&config.user_agent),
            updates,
        )
    }

    pub fn from_specs(
        launcher: ChannelSpec,
        game: ChannelSpec,
        dev: Option<ChannelSpec>,
        network: NetworkClient,
        updates: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        let shared = |id, spec| {
            Arc::new(Mutex::new(ChannelController::new(
                id,
                spec,
                network.clone(),
                updates.clone(),
            )))
        };
        let launcher = shared(ChannelId::Launcher, launcher);
        let game = shared(ChannelId::Game, game);
        let dev = dev.map(|spec| shared(ChannelId::Dev, spec));
        Self {
            launcher,
            game,
            dev,
            updates,
        }
    }

    fn channel(&self, id: ChannelId) -> Option<&SharedChannel> {
        match id {
            ChannelId::Launcher => Some(&self.launcher),
            ChannelId::Game => Some(&self.game),
            ChannelId::Dev => self.dev.as_ref(),
        }
    }

    fn game_channels(&self) -> impl Iterator<Item = &SharedChannel> {
        std::iter::once(&self.game).chain(self.dev.iter())
    }

    pub async fn handle_action(&self, action: UserAction) -> Option<TriggerOutcome> {
        match action {
            UserAction::CheckAll => {
                info!("action: CheckAll");
                self.check_all().await;
                None
            }
            UserAction::Trigger(id) => {
                info!("action: Trigger({id})");
                Some(self.trigger(id).await)
            }
        }
    }

    /// Check the launcher first, then every game channel unless the launcher
    /// needs updating.
    pub async fn check_all(&self) {
        let launcher_pending = match self.launcher.try_lock() {
            Ok(mut launcher) => {
                launcher.check().await;
                launcher_update_pending(launcher.state())
            }
            // Busy means the launcher update is already downloading.
            Err(_) => true,
        };

        for channel in self.game_channels() {
            let Ok(mut channel) = channel.try_lock() else {
                debug!("check_all: channel busy; skipping");
                continue;
            };
            if launcher_pending {
                channel.set_state(ChannelState::Blocked);
            } else {
                channel.check().await;
            }
        }
    }

    pub async fn trigger(&self, id: ChannelId) -> TriggerOutcome {
        let Some(channel) = self.channel(id) else {
            self.report(id, format!("the {id} channel is not configured"));
            return TriggerOutcome::Refused;
        };
        if id != ChannelId::Launcher && self.launcher_pending() {
            self.report(id, "the launcher must be updated first".into());
            return TriggerOutcome::Refused;
        }
        let Ok(mut channel) = channel.try_lock() else {
            warn!("trigger: {id} channel is busy");
            return TriggerOutcome::Refused;
        };
        debug!("trigger: {} from {:?}", channel.id(), channel.state());
        channel.trigger().await
    }

    /// Current state of a channel, if it is idle enough to be inspected.
    #[cfg(test)]
    pub fn snapshot(&self, id: ChannelId) -> Option<ChannelState> {
        let channel = self.channel(id)?;
        channel.try_lock().ok().map(|c| c.state().clone())
    }

    fn launcher_pending(&self) -> bool {
        match self.launcher.try_lock() {
            Ok(launcher) => launcher_update_pending(launcher.state()),
            Err(_) => true,
        }
    }

    fn report(&self, channel: ChannelId, message: String) {
        warn!("engine: {message}");
        let _ = self.updates.send(EngineEvent::Error { channel, message });
    }
}

fn launcher_update_pending(state: &ChannelState) -> bool {
    matches!(
        state,
        ChannelState::UpdateAvailable { .. }
            | ChannelState::Downloading { .. }
            | ChannelState::HandingOff
    )
}
