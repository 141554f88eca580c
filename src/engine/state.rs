use std::fmt;
use std::path::PathBuf;

/// Independent update track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelId {
    Launcher,
    Game,
    Dev,
}

impl ChannelId {
    pub fn name(self) -> &'static str {
        match self {
            ChannelId::Launcher => "launcher",
            ChannelId::Game => "game",
            ChannelId::Dev => "dev",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// What a channel currently shows; one per channel.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelState {
    Unknown,
    Checking,
    NotInstalled,
    UpToDate {
        tag: String,
    },
    UpdateAvailable {
        local: String,
        remote: String,
    },
    Downloading {
        tag: String,
        downloaded: u64,
        total: u64,
        progress: f32,
        speed: f64,
    },
    Installing {
        tag: String,
    },
    Ready {
        tag: String,
    },
    Running,
    /// A pending launcher update holds this channel back.
    Blocked,
    HandingOff,
}

impl ChannelState {
    /// Label of the trigger control, if it is shown at all.
    pub fn action_label(&self, channel: ChannelId) -> Option<&'static str> {
        match (channel, self) {
            (ChannelId::Launcher, ChannelState::UpdateAvailable { .. }) => Some("Update launcher"),
            (ChannelId::Launcher, _) => None,
            (_, ChannelState::NotInstalled) => Some("Install"),
            (_, ChannelState::UpdateAvailable { .. }) => Some("Update"),
            (_, ChannelState::UpToDate { .. }) => Some("Launch"),
            _ => None,
        }
    }

    /// Whether the trigger control is enabled.
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            ChannelState::Unknown
                | ChannelState::NotInstalled
                | ChannelState::UpToDate { .. }
                | ChannelState::UpdateAvailable { .. }
        )
    }
}

/// Everything the engine reports back to the frontend loop.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    State {
        channel: ChannelId,
        state: ChannelState,
    },
    Error {
        channel: ChannelId,
        message: String,
    },
    /// The game started; the frontend steps aside.
    Launched {
        channel: ChannelId,
    },
    /// The game exited; the frontend comes back.
    Exited {
        channel: ChannelId,
        code: Option<i32>,
    },
    /// The launcher installer is running; the launcher should exit now.
    HandOff {
        installer: PathBuf,
    },
}

// Actions triggered from the frontend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserAction {
    CheckAll,
    Trigger(ChannelId),
}
