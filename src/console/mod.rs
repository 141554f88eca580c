use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;

use crate::config::LauncherConfig;
use crate::engine::LauncherEngine;
use crate::engine::state::{ChannelId, ChannelState, EngineEvent, UserAction};
use crate::util::format_speed;

fn build_runtime() -> Arc<Runtime> {
    match Runtime::new() {
        Ok(rt) => Arc::new(rt),
        Err(err) => {
            warn!(
                "console: failed to create multithreaded runtime ({}); trying single-threaded runtime",
                err
            );
            match Builder::new_current_thread().enable_all().build() {
                Ok(rt) => Arc::new(rt),
                Err(fallback_err) => {
                    error!(
                        "console: failed to create any Tokio runtime ({}); terminating launcher",
                        fallback_err
                    );
                    std::process::exit(1);
                }
            }
        }
    }
}

/// Terminal frontend: runs the engine on a runtime and renders its events.
pub struct Console {
    config: LauncherConfig,
    app_dir: PathBuf,
    hide_while_running: bool,
    progress: Option<ProgressBar>,
    failed: bool,
}

impl Console {
    pub fn new(config: LauncherConfig, app_dir: PathBuf) -> Self {
        let hide_while_running = config.hide_while_running;
        Self {
            config,
            app_dir,
            hide_while_running,
            progress: None,
            failed: false,
        }
    }

    /// Check every channel, then optionally trigger one of them.
    pub fn run(mut self, trigger: Option<ChannelId>) -> ExitCode {
        let runtime = build_runtime();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let engine = LauncherEngine::new(&self.config, &self.app_dir, tx);

        // The engine task owns the only sender; the loop below ends with it.
        runtime.spawn(async move {
            engine.handle_action(UserAction::CheckAll).await;
            if let Some(id) = trigger {
                let outcome = engine.handle_action(UserAction::Trigger(id)).await;
                info!("console: {id} finished with {outcome:?}");
            }
        });

        while let Some(event) = rx.blocking_recv() {
            self.render(event);
        }
        self.finish_progress();

        if self.failed {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        }
    }

    fn render(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::State {
                channel,
                state:
                    ChannelState::Downloading {
                        tag,
                        downloaded,
                        total,
                        progress,
                        speed,
                    },
            } => {
                let bar = self.progress.get_or_insert_with(|| {
                    let bar = ProgressBar::new(total);
                    bar.set_style(
                        ProgressStyle::default_bar()
                            .template("{prefix} [{wide_bar:.cyan/blue}] {msg}")
                            .unwrap_or_else(|_| ProgressStyle::default_bar())
                            .progress_chars("=>-"),
                    );
                    bar.set_prefix(format!("{channel} {tag}"));
                    bar
                });
                bar.set_length(total);
                bar.set_position(downloaded.min(total));
                bar.set_message(format!("{} ({progress:.1}%)", format_speed(speed)));
            }
            EngineEvent::State { channel, state } => {
                self.finish_progress();
                if let Some(line) = describe(channel, &state) {
                    println!("{line}");
                }
            }
            EngineEvent::Error { channel, message } => {
                self.finish_progress();
                self.failed = true;
                eprintln!("[{channel}] error: {message}");
            }
            EngineEvent::Launched { channel } => {
                if self.hide_while_running {
                    println!("[{channel}] game started; waiting for it to exit");
                } else {
                    println!("[{channel}] game started");
                }
            }
            EngineEvent::Exited { channel, code } => match code {
                Some(code) => println!("[{channel}] game exited with code {code}"),
                None => println!("[{channel}] game exited"),
            },
            EngineEvent::HandOff { installer } => {
                self.finish_progress();
                println!("launcher installer started ({}); exiting", installer.display());
                std::process::exit(0);
            }
        }
    }

    fn finish_progress(&mut self) {
        if let Some(bar) = self.progress.take() {
            bar.finish_and_clear();
        }
    }
}

/// One status line for a state change, or `None` for transient states.
fn describe(channel: ChannelId, state: &ChannelState) -> Option<String> {
    let status = match state {
        ChannelState::Unknown | ChannelState::Checking | ChannelState::Downloading { .. } => {
            return None;
        }
        ChannelState::NotInstalled => "not installed".to_owned(),
        ChannelState::UpToDate { tag } => format!("up to date ({tag})"),
        ChannelState::UpdateAvailable { local, remote } => {
            format!("update available ({local} -> {remote})")
        }
        ChannelState::Installing { tag } => format!("installing {tag}"),
        ChannelState::Ready { tag } => format!("installed {tag}"),
        ChannelState::Running => "running".to_owned(),
        ChannelState::Blocked => "waiting for launcher update".to_owned(),
        ChannelState::HandingOff => "starting installer".to_owned(),
    };
    Some(match state.action_label(channel) {
        Some(label) => format!("[{channel}] {status} [{label}]"),
        None => format!("[{channel}] {status}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_states_print_nothing() {
        assert_eq!(describe(ChannelId::Game, &ChannelState::Checking), None);
        assert_eq!(describe(ChannelId::Game, &ChannelState::Unknown), None);
    }

    #[test]
    fn lines_carry_the_action_label() {
        assert_eq!(
            describe(ChannelId::Game, &ChannelState::NotInstalled).as_deref(),
            Some("[game] not installed [Install]")
        );
        assert_eq!(
            describe(
                ChannelId::Launcher,
                &ChannelState::UpdateAvailable {
                    local: "0.3.0".into(),
                    remote: "v0.4.0".into()
                }
            )
            .as_deref(),
            Some("[launcher] update available (0.3.0 -> v0.4.0) [Update launcher]")
        );
        assert_eq!(
            describe(ChannelId::Dev, &ChannelState::Blocked).as_deref(),
            Some("[dev] waiting for launcher update")
        );
    }
}
