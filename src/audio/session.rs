//! Per-guild playback state and its transitions.
//!
//! A [`PlaybackSession`] owns the queue, the current track, the voice
//! connection and the live progress reporter of one guild. All state sits
//! behind a single `parking_lot::Mutex` that is only held for short,
//! non-suspending sections: every transport call happens after the lock is
//! released, with the decision already recorded in the state.
//!
//! Each loaded track gets a fresh generation number. Completion events and
//! reporter loops carry the generation they were started for, so anything
//! arriving for an older track is ignored instead of advancing the queue
//! twice or drawing over the new track's display.

use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    audio::{
        queue::TrackQueue,
        track::Track,
        transport::{
            TrackEnd, TrackEndNotifier, TrackEndSender, TransportStatus, VoiceConnection,
            VoiceGateway,
        },
    },
    bot::presence::{Presence, PresenceState},
    error::{MusicError, MusicResult},
    ui::{
        display::{NowPlayingView, StatusChannel, StatusLabel},
        reporter::{ProgressReporter, ReporterHandle, ReporterSettings},
    },
};

/// Collaborators shared by every session of the process.
pub struct PlaybackServices {
    pub gateway: Arc<dyn VoiceGateway>,
    pub presence: Arc<dyn Presence>,
    pub track_events: TrackEndSender,
    pub reporter: ReporterSettings,
}

#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No voice connection
    Idle,
    /// Connected, nothing loaded
    ConnectedIdle,
    Playing,
    Paused,
}

/// Result of [`PlaybackSession::enqueue_tracks`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnqueueOutcome {
    /// Track that started right away, if the session was idle
    pub started: Option<Track>,
    /// Number of tracks appended to the queue
    pub queued: usize,
}

/// Point-in-time view of the current track.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub track: Track,
    pub elapsed: Duration,
    pub generation: u64,
    pub status: TransportStatus,
}

impl NowPlaying {
    pub fn view(&self, bar_length: usize) -> NowPlayingView {
        NowPlayingView::render(
            &self.track,
            self.elapsed,
            StatusLabel::from_transport(self.status),
            bar_length,
        )
    }
}

struct CurrentTrack {
    track: Track,
    started_at: Instant,
    generation: u64,
}

#[derive(Default)]
struct SessionInner {
    queue: TrackQueue,
    current: Option<CurrentTrack>,
    paused: bool,
    connection: Option<Arc<dyn VoiceConnection>>,
    voice_channel: Option<ChannelId>,
    idle_since: Option<Instant>,
    reporter: Option<ReporterHandle>,
    status_channel: Option<Arc<dyn StatusChannel>>,
    generation: u64,
}

/// A track that has been made current but not handed to the transport yet.
struct PendingStart {
    track: Track,
    generation: u64,
    connection: Option<Arc<dyn VoiceConnection>>,
    replaced_reporter: Option<ReporterHandle>,
}

pub struct PlaybackSession {
    guild_id: GuildId,
    services: Arc<PlaybackServices>,
    inner: Mutex<SessionInner>,
}

impl PlaybackSession {
    pub fn new(guild_id: GuildId, services: Arc<PlaybackServices>) -> Self {
        Self {
            guild_id,
            services,
            inner: Mutex::new(SessionInner::default()),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    #[cfg(test)]
    pub fn state(&self) -> SessionState {
        let inner = self.inner.lock();
        match (&inner.connection, &inner.current) {
            (None, _) => SessionState::Idle,
            (Some(_), None) => SessionState::ConnectedIdle,
            (Some(_), Some(_)) if inner.paused => SessionState::Paused,
            (Some(_), Some(_)) => SessionState::Playing,
        }
    }

    #[cfg(test)]
    pub fn current_track(&self) -> Option<Track> {
        self.inner.lock().current.as_ref().map(|c| c.track.clone())
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().connection.is_some()
    }

    pub fn voice_channel(&self) -> Option<ChannelId> {
        self.inner.lock().voice_channel
    }

    pub fn idle_since(&self) -> Option<Instant> {
        self.inner.lock().idle_since
    }

    pub fn set_idle_since(&self, since: Option<Instant>) {
        self.inner.lock().idle_since = since;
    }

    #[cfg(test)]
    pub fn has_reporter(&self) -> bool {
        self.inner.lock().reporter.is_some()
    }

    /// Text channel future now-playing displays are posted to
    pub fn bind_status_channel(&self, channel: Arc<dyn StatusChannel>) {
        self.inner.lock().status_channel = Some(channel);
    }

    /// Connects to `target` unless a connection is already held.
    pub async fn ensure_connected(&self, target: Option<ChannelId>) -> MusicResult<()> {
        if self.is_connected() {
            return Ok(());
        }

        let channel_id = target.ok_or(MusicError::NoVoiceChannel)?;
        let connection = self
            .services
            .gateway
            .connect(self.guild_id, channel_id)
            .await?;

        let mut inner = self.inner.lock();
        if inner.connection.is_none() {
            inner.connection = Some(connection);
            inner.voice_channel = Some(channel_id);
            inner.idle_since = None;
            info!("🔊 Connected to voice channel {} in guild {}", channel_id, self.guild_id);
        }
        Ok(())
    }

    /// The bot was moved to another channel by someone else
    pub fn follow_voice_channel(&self, channel_id: ChannelId) {
        let mut inner = self.inner.lock();
        if inner.connection.is_some() && inner.voice_channel != Some(channel_id) {
            info!("🔀 Moved to voice channel {} in guild {}", channel_id, self.guild_id);
            inner.voice_channel = Some(channel_id);
            inner.idle_since = None;
        }
    }

    /// Plays the first track if nothing is current, queues the rest.
    ///
    /// Without a voice connection everything is queued.
    pub async fn enqueue_tracks(self: &Arc<Self>, tracks: Vec<Track>) -> EnqueueOutcome {
        let mut tracks = tracks.into_iter();

        let (pending, queued) = {
            let mut inner = self.inner.lock();
            if inner.current.is_some() || inner.connection.is_none() {
                let queued = inner.queue.add_tracks(tracks);
                return EnqueueOutcome { started: None, queued };
            }

            let Some(first) = tracks.next() else {
                return EnqueueOutcome::default();
            };
            let queued = inner.queue.add_tracks(tracks);
            (self.load(&mut inner, first), queued)
        };

        let started = pending.track.clone();
        self.start(pending).await;

        EnqueueOutcome {
            started: Some(started),
            queued,
        }
    }

    /// Single-track form of [`enqueue_tracks`](Self::enqueue_tracks)
    pub async fn enqueue_or_play(self: &Arc<Self>, track: Track) -> EnqueueOutcome {
        self.enqueue_tracks(vec![track]).await
    }

    /// Pops the queue head without touching the current track
    pub fn next_track(&self) -> Option<Track> {
        self.inner.lock().queue.next_track()
    }

    pub fn clear_queue(&self) -> usize {
        self.inner.lock().queue.clear()
    }

    pub fn list_queue(&self, limit: usize) -> Vec<Track> {
        self.inner.lock().queue.list(limit)
    }

    pub fn queue_len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Applies a completion event from the transport.
    pub async fn handle_track_end(self: &Arc<Self>, event: TrackEnd) -> Option<Track> {
        if let Some(error) = &event.error {
            warn!("⚠️ Track failed in guild {}: {}, moving on", self.guild_id, error);
        }
        self.advance(event.generation).await
    }

    /// Moves from the track of `generation` to the next queued one.
    async fn advance(self: &Arc<Self>, generation: u64) -> Option<Track> {
        let (pending, finished_reporter) = {
            let mut inner = self.inner.lock();
            match &inner.current {
                Some(current) if current.generation == generation => {}
                _ => {
                    debug!("Ignoring stale track end (generation {})", generation);
                    return None;
                }
            }

            match inner.queue.next_track() {
                Some(next) => (Some(self.load(&mut inner, next)), None),
                None => {
                    inner.current = None;
                    inner.paused = false;
                    (None, inner.reporter.take())
                }
            }
        };

        match pending {
            Some(pending) => {
                let next = pending.track.clone();
                self.start(pending).await;
                Some(next)
            }
            None => {
                if let Some(reporter) = finished_reporter {
                    reporter.stop();
                }
                info!("📭 Queue finished in guild {}", self.guild_id);
                self.services.presence.set_activity(PresenceState::Idle);
                None
            }
        }
    }

    /// Pauses the transport and freezes the display.
    pub async fn pause(self: &Arc<Self>) -> MusicResult<Track> {
        let (connection, generation) = {
            let inner = self.inner.lock();
            let current = inner
                .current
                .as_ref()
                .filter(|_| !inner.paused)
                .ok_or(MusicError::NothingPlaying)?;
            let connection = inner.connection.clone().ok_or(MusicError::NotConnected)?;
            (connection, current.generation)
        };

        connection.pause().await?;

        let (track, reporter) = {
            let mut inner = self.inner.lock();
            let Some(current) = inner.current.as_ref().filter(|c| c.generation == generation) else {
                return Err(MusicError::NothingPlaying);
            };
            let track = current.track.clone();
            inner.paused = true;
            (track, inner.reporter.take())
        };

        if let Some(reporter) = reporter {
            reporter.stop();
        }
        info!("⏸️ Paused {} in guild {}", track.title, self.guild_id);
        self.services.presence.set_activity(PresenceState::paused(&track.title));
        self.post_snapshot().await;

        Ok(track)
    }

    /// Resumes a paused track and restarts the display.
    pub async fn resume(self: &Arc<Self>) -> MusicResult<Track> {
        let (connection, generation) = {
            let inner = self.inner.lock();
            let current = inner
                .current
                .as_ref()
                .filter(|_| inner.paused)
                .ok_or(MusicError::NotPaused)?;
            let connection = inner.connection.clone().ok_or(MusicError::NotConnected)?;
            (connection, current.generation)
        };

        connection.resume().await?;

        let track = {
            let mut inner = self.inner.lock();
            let Some(current) = inner.current.as_ref().filter(|c| c.generation == generation) else {
                return Err(MusicError::NotPaused);
            };
            let track = current.track.clone();
            inner.paused = false;
            track
        };

        info!("▶️ Resumed {} in guild {}", track.title, self.guild_id);
        self.services.presence.set_activity(PresenceState::listening(&track.title));
        self.start_reporter(generation);

        Ok(track)
    }

    /// Stops the current track; the resulting track end advances the queue.
    pub async fn skip(&self) -> MusicResult<Track> {
        let (connection, track, reporter) = {
            let mut inner = self.inner.lock();
            let track = inner
                .current
                .as_ref()
                .map(|c| c.track.clone())
                .ok_or(MusicError::NothingPlaying)?;
            let connection = inner.connection.clone().ok_or(MusicError::NotConnected)?;
            (connection, track, inner.reporter.take())
        };

        if let Some(reporter) = reporter {
            reporter.stop();
        }
        info!("⏭️ Skipping {} in guild {}", track.title, self.guild_id);
        connection.stop().await?;

        Ok(track)
    }

    /// Drops the queue and the current track but keeps the connection.
    pub async fn stop(&self) -> MusicResult<()> {
        let (connection, reporter) = {
            let mut inner = self.inner.lock();
            let connection = inner.connection.clone().ok_or(MusicError::NotConnected)?;
            inner.queue.clear();
            inner.current = None;
            inner.paused = false;
            inner.generation += 1;
            (connection, inner.reporter.take())
        };

        if let Some(reporter) = reporter {
            reporter.stop();
        }
        if let Err(e) = connection.stop().await {
            warn!("Error stopping transport in guild {}: {}", self.guild_id, e);
        }
        self.services.presence.set_activity(PresenceState::Idle);
        info!("⏹️ Playback stopped in guild {}", self.guild_id);

        Ok(())
    }

    /// The bot's own voice state reported no channel.
    ///
    /// `still_in` is where the gateway cache places the bot now. A channel
    /// there means the report predates a newer join, so it is ignored.
    pub async fn handle_voice_disconnect(&self, still_in: Option<ChannelId>) -> MusicResult<()> {
        if let Some(channel_id) = still_in {
            debug!(
                "Ignoring stale voice disconnect in guild {}, still in {}",
                self.guild_id, channel_id
            );
            return Ok(());
        }

        info!("🔌 Disconnected from voice externally in guild {}", self.guild_id);
        self.leave().await
    }

    /// Leave sequence: resets the session and releases the connection.
    pub async fn leave(&self) -> MusicResult<()> {
        let (connection, reporter) = {
            let mut inner = self.inner.lock();
            let connection = inner.connection.take().ok_or(MusicError::NotConnected)?;
            let reporter = inner.reporter.take();
            inner.queue.clear();
            inner.current = None;
            inner.paused = false;
            inner.voice_channel = None;
            inner.idle_since = None;
            inner.status_channel = None;
            inner.generation += 1;
            (connection, reporter)
        };

        if let Some(reporter) = reporter {
            reporter.stop();
        }
        if let Err(e) = connection.disconnect().await {
            warn!("Error disconnecting in guild {}: {}", self.guild_id, e);
        }
        self.services.presence.set_activity(PresenceState::Idle);
        info!("👋 Left voice in guild {}", self.guild_id);

        Ok(())
    }

    /// Snapshot of the current track, with the transport's live status.
    pub async fn now_playing(&self) -> Option<NowPlaying> {
        let (track, started_at, generation, connection) = {
            let inner = self.inner.lock();
            let current = inner.current.as_ref()?;
            (
                current.track.clone(),
                current.started_at,
                current.generation,
                inner.connection.clone(),
            )
        };

        let status = match connection {
            Some(connection) => connection.status().await,
            None => TransportStatus::Disconnected,
        };

        Some(NowPlaying {
            track,
            elapsed: started_at.elapsed(),
            generation,
            status,
        })
    }

    /// Forgets reporter `id` once its loop has ended on its own.
    pub(crate) fn release_reporter(&self, id: u64) {
        let mut inner = self.inner.lock();
        if inner.reporter.as_ref().map(ReporterHandle::id) == Some(id) {
            inner.reporter = None;
        }
    }

    /// Makes `track` current. Must run under the state lock.
    fn load(&self, inner: &mut SessionInner, track: Track) -> PendingStart {
        inner.generation += 1;
        inner.current = Some(CurrentTrack {
            track: track.clone(),
            started_at: Instant::now(),
            generation: inner.generation,
        });
        inner.paused = false;

        PendingStart {
            track,
            generation: inner.generation,
            connection: inner.connection.clone(),
            replaced_reporter: inner.reporter.take(),
        }
    }

    /// Hands a loaded track to the transport.
    ///
    /// A failed start is reported as a failed track so the queue moves on.
    async fn start(self: &Arc<Self>, pending: PendingStart) {
        if let Some(reporter) = pending.replaced_reporter {
            reporter.stop();
        }

        let notifier = TrackEndNotifier::new(
            self.guild_id,
            pending.generation,
            self.services.track_events.clone(),
        );

        let Some(connection) = pending.connection else {
            notifier.notify(Some(MusicError::NotConnected.to_string()));
            return;
        };

        match connection.play(&pending.track, notifier.clone()).await {
            Ok(()) => {
                info!("🎵 Now playing in guild {}: {}", self.guild_id, pending.track.title);
                self.services
                    .presence
                    .set_activity(PresenceState::listening(&pending.track.title));
                self.start_reporter(pending.generation);
            }
            Err(e) => {
                warn!("❌ Could not start {}: {}", pending.track.title, e);
                notifier.notify(Some(e.to_string()));
            }
        }
    }

    /// Binds a fresh reporter to the track of `generation`, replacing any other.
    fn start_reporter(self: &Arc<Self>, generation: u64) {
        let replaced = {
            let mut inner = self.inner.lock();
            let is_current = inner
                .current
                .as_ref()
                .is_some_and(|c| c.generation == generation);
            let Some(channel) = inner.status_channel.clone().filter(|_| is_current) else {
                return;
            };

            let handle = ProgressReporter::spawn(
                Arc::downgrade(self),
                channel,
                generation,
                self.services.reporter,
            );
            inner.reporter.replace(handle)
        };

        if let Some(reporter) = replaced {
            reporter.stop();
        }
    }

    /// Posts a one-off render of the current state, without live updates.
    async fn post_snapshot(&self) {
        let Some(channel) = self.inner.lock().status_channel.clone() else {
            return;
        };
        let Some(now_playing) = self.now_playing().await else {
            return;
        };

        let view = now_playing.view(self.services.reporter.bar_length);
        if let Err(e) = channel.send(&view).await {
            warn!("Could not post now-playing snapshot in guild {}: {}", self.guild_id, e);
        }
    }
}
