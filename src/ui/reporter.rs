//! Live now-playing message, re-rendered on an eased schedule.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Weak,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    audio::session::{NowPlaying, PlaybackSession},
    error::MusicError,
    ui::{
        display::{StatusChannel, StatusMessage},
        interval::IntervalBounds,
    },
};

static NEXT_REPORTER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReporterSettings {
    pub bar_length: usize,
    pub bounds: IntervalBounds,
}

impl Default for ReporterSettings {
    fn default() -> Self {
        Self {
            bar_length: 25,
            bounds: IntervalBounds::default(),
        }
    }
}

/// Owner side of a running reporter. Dropping it stops the loop.
#[derive(Debug)]
pub struct ReporterHandle {
    id: u64,
    token: CancellationToken,
}

impl ReporterHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Idempotent; no edit is issued after this returns.
    pub fn stop(&self) {
        self.token.cancel();
    }
}

impl Drop for ReporterHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Loop bound to one track of one session.
pub struct ProgressReporter {
    id: u64,
    session: Weak<PlaybackSession>,
    channel: Arc<dyn StatusChannel>,
    generation: u64,
    settings: ReporterSettings,
    token: CancellationToken,
}

impl ProgressReporter {
    /// Spawns the loop for the track of `generation`.
    pub fn spawn(
        session: Weak<PlaybackSession>,
        channel: Arc<dyn StatusChannel>,
        generation: u64,
        settings: ReporterSettings,
    ) -> ReporterHandle {
        let id = NEXT_REPORTER_ID.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();

        let reporter = Self {
            id,
            session,
            channel,
            generation,
            settings,
            token: token.clone(),
        };
        tokio::spawn(reporter.run());

        ReporterHandle { id, token }
    }

    async fn run(self) {
        if let Some(mut message) = self.post_initial().await {
            self.update_until_done(message.as_mut()).await;
        }

        if let Some(session) = self.session.upgrade() {
            session.release_reporter(self.id);
        }
        debug!("Progress reporter {} finished", self.id);
    }

    async fn post_initial(&self) -> Option<Box<dyn StatusMessage>> {
        let snapshot = self.snapshot().await?;
        let view = snapshot.view(self.settings.bar_length);

        tokio::select! {
            _ = self.token.cancelled() => None,
            result = self.channel.send(&view) => match result {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!("Could not post now-playing message: {}", e);
                    None
                }
            },
        }
    }

    async fn update_until_done(&self, message: &mut dyn StatusMessage) {
        loop {
            let Some(snapshot) = self.snapshot().await else {
                return;
            };
            let delay = self.settings.bounds.delay(
                snapshot.elapsed.as_secs_f64(),
                snapshot.track.duration.as_secs_f64(),
            );

            tokio::select! {
                _ = self.token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            let Some(snapshot) = self.snapshot().await else {
                return;
            };
            if snapshot.track.has_known_duration() && snapshot.elapsed >= snapshot.track.duration {
                debug!("Track finished, reporter {} done", self.id);
                return;
            }

            let view = snapshot.view(self.settings.bar_length);
            let result = tokio::select! {
                _ = self.token.cancelled() => return,
                result = message.edit(&view) => result,
            };

            match result {
                Ok(()) => {}
                Err(MusicError::DisplayGone) => {
                    debug!("Now-playing message was deleted, reporter {} done", self.id);
                    return;
                }
                Err(e) => {
                    warn!("Failed to update now-playing message, reporter {} stops: {}", self.id, e);
                    return;
                }
            }
        }
    }

    /// Current state, or `None` once the loop has nothing left to show.
    async fn snapshot(&self) -> Option<NowPlaying> {
        if self.token.is_cancelled() {
            return None;
        }

        let session = self.session.upgrade()?;
        let snapshot = session.now_playing().await?;

        if snapshot.generation != self.generation || !snapshot.status.is_active() {
            return None;
        }
        Some(snapshot)
    }
}
