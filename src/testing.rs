//! Fakes for the transport, display, presence and membership seams.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::sync::mpsc;

use crate::{
    audio::{
        reaper::MembershipProbe,
        registry::SessionRegistry,
        session::{PlaybackServices, PlaybackSession},
        track::Track,
        transport::{
            TrackEndNotifier, TrackEndReceiver, TransportStatus, VoiceConnection, VoiceGateway,
        },
    },
    bot::presence::{Presence, PresenceState},
    error::{MusicError, MusicResult},
    ui::{
        display::{NowPlayingView, StatusChannel, StatusMessage},
        reporter::ReporterSettings,
    },
};

pub fn track(title: &str) -> Track {
    Track::new(format!("https://yt.example/watch?v={}", title), title)
}

#[derive(Default)]
struct ConnectionState {
    played: Vec<String>,
    notifier: Option<TrackEndNotifier>,
    status: Option<TransportStatus>,
    fail_next_play: bool,
}

/// Voice connection that never streams; tracks end when the test says so.
#[derive(Default)]
pub struct FakeConnection {
    state: Mutex<ConnectionState>,
}

impl FakeConnection {
    pub fn played_titles(&self) -> Vec<String> {
        self.state.lock().played.clone()
    }

    pub fn status_now(&self) -> TransportStatus {
        self.state.lock().status.unwrap_or(TransportStatus::Stopped)
    }

    /// Changes what the transport reports without touching the session
    pub fn set_status(&self, status: TransportStatus) {
        self.state.lock().status = Some(status);
    }

    pub fn fail_next_play(&self) {
        self.state.lock().fail_next_play = true;
    }

    /// Ends the loaded track as the transport would
    pub fn finish_current(&self, error: Option<&str>) {
        let notifier = {
            let mut state = self.state.lock();
            state.status = Some(TransportStatus::Stopped);
            state.notifier.take()
        };
        if let Some(notifier) = notifier {
            notifier.notify(error.map(str::to_string));
        }
    }
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    async fn play(&self, track: &Track, on_end: TrackEndNotifier) -> MusicResult<()> {
        let mut state = self.state.lock();
        if state.fail_next_play {
            state.fail_next_play = false;
            return Err(MusicError::Transport("stream refused".to_string()));
        }
        state.played.push(track.title.clone());
        state.notifier = Some(on_end);
        state.status = Some(TransportStatus::Playing);
        Ok(())
    }

    async fn pause(&self) -> MusicResult<()> {
        self.state.lock().status = Some(TransportStatus::Paused);
        Ok(())
    }

    async fn resume(&self) -> MusicResult<()> {
        self.state.lock().status = Some(TransportStatus::Playing);
        Ok(())
    }

    async fn stop(&self) -> MusicResult<()> {
        self.finish_current(None);
        Ok(())
    }

    async fn status(&self) -> TransportStatus {
        self.status_now()
    }

    async fn disconnect(&self) -> MusicResult<()> {
        self.finish_current(None);
        self.state.lock().status = Some(TransportStatus::Disconnected);
        Ok(())
    }
}

/// Hands out the same [`FakeConnection`] for every join.
pub struct FakeGateway {
    connection: Arc<FakeConnection>,
    connects: AtomicUsize,
}

impl FakeGateway {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceGateway for FakeGateway {
    async fn connect(
        &self,
        _guild_id: GuildId,
        _channel_id: ChannelId,
    ) -> MusicResult<Arc<dyn VoiceConnection>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.connection.clone())
    }
}

#[derive(Default)]
pub struct RecordingPresence {
    states: Mutex<Vec<PresenceState>>,
}

impl RecordingPresence {
    pub fn last(&self) -> Option<PresenceState> {
        self.states.lock().last().cloned()
    }
}

impl Presence for RecordingPresence {
    fn set_activity(&self, state: PresenceState) {
        self.states.lock().push(state);
    }
}

#[derive(Default)]
struct DisplayLog {
    sends: Vec<NowPlayingView>,
    edits: Vec<NowPlayingView>,
    edit_attempts: usize,
    deleted: bool,
    failing: bool,
}

/// Records every post and edit of the now-playing display.
#[derive(Default)]
pub struct FakeStatusChannel {
    log: Arc<Mutex<DisplayLog>>,
}

impl FakeStatusChannel {
    pub fn sends(&self) -> Vec<NowPlayingView> {
        self.log.lock().sends.clone()
    }

    pub fn edits(&self) -> Vec<NowPlayingView> {
        self.log.lock().edits.clone()
    }

    pub fn edit_attempts(&self) -> usize {
        self.log.lock().edit_attempts
    }

    /// Every posted message behaves as deleted from now on
    pub fn delete_messages(&self) {
        self.log.lock().deleted = true;
    }

    /// Edits fail with a server error from now on
    pub fn fail_edits(&self) {
        self.log.lock().failing = true;
    }
}

#[async_trait]
impl StatusChannel for FakeStatusChannel {
    async fn send(&self, view: &NowPlayingView) -> MusicResult<Box<dyn StatusMessage>> {
        self.log.lock().sends.push(view.clone());
        Ok(Box::new(FakeStatusMessage {
            log: self.log.clone(),
        }))
    }
}

struct FakeStatusMessage {
    log: Arc<Mutex<DisplayLog>>,
}

#[async_trait]
impl StatusMessage for FakeStatusMessage {
    async fn edit(&mut self, view: &NowPlayingView) -> MusicResult<()> {
        let mut log = self.log.lock();
        log.edit_attempts += 1;
        if log.deleted {
            return Err(MusicError::DisplayGone);
        }
        if log.failing {
            return Err(MusicError::Transport("500 internal".to_string()));
        }
        log.edits.push(view.clone());
        Ok(())
    }
}

/// Channels are empty unless set otherwise.
#[derive(Default)]
pub struct FakeMembership {
    members: Mutex<HashMap<ChannelId, usize>>,
    failing: Mutex<HashSet<GuildId>>,
}

impl FakeMembership {
    pub fn set(&self, channel_id: ChannelId, humans: usize) {
        self.members.lock().insert(channel_id, humans);
    }

    pub fn fail_guild(&self, guild_id: GuildId) {
        self.failing.lock().insert(guild_id);
    }
}

impl MembershipProbe for FakeMembership {
    fn human_members(&self, guild_id: GuildId, channel_id: ChannelId) -> MusicResult<usize> {
        if self.failing.lock().contains(&guild_id) {
            return Err(MusicError::GuildUnavailable(guild_id));
        }
        Ok(self.members.lock().get(&channel_id).copied().unwrap_or(0))
    }
}

/// A registry wired to fakes, plus the receiving end of its track events.
pub struct Harness {
    pub guild_id: GuildId,
    pub voice_channel: ChannelId,
    pub registry: Arc<SessionRegistry>,
    pub gateway: Arc<FakeGateway>,
    pub connection: Arc<FakeConnection>,
    pub presence: Arc<RecordingPresence>,
    pub display: Arc<FakeStatusChannel>,
    events: TrackEndReceiver,
}

impl Harness {
    pub fn new() -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let connection = Arc::new(FakeConnection::default());
        let gateway = Arc::new(FakeGateway {
            connection: connection.clone(),
            connects: AtomicUsize::new(0),
        });
        let presence = Arc::new(RecordingPresence::default());

        let registry = Arc::new(SessionRegistry::new(PlaybackServices {
            gateway: gateway.clone(),
            presence: presence.clone(),
            track_events: tx,
            reporter: ReporterSettings::default(),
        }));

        Self {
            guild_id: GuildId::new(1),
            voice_channel: ChannelId::new(10),
            registry,
            gateway,
            connection,
            presence,
            display: Arc::new(FakeStatusChannel::default()),
            events,
        }
    }

    /// Session of the default guild, joined and bound to the fake display
    pub async fn connected_session(&self) -> Arc<PlaybackSession> {
        let session = self.registry.get_or_create(self.guild_id);
        session
            .ensure_connected(Some(self.voice_channel))
            .await
            .expect("fake gateway always connects");
        session.bind_status_channel(self.display.clone());
        session
    }

    /// Applies pending track-end events, including ones they cause.
    pub async fn pump(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            if let Some(session) = self.registry.get(event.guild_id) {
                session.handle_track_end(event).await;
            }
        }
    }

    /// Hands the event stream to a real dispatcher
    pub fn take_events(&mut self) -> TrackEndReceiver {
        std::mem::replace(&mut self.events, mpsc::unbounded_channel().1)
    }
}
