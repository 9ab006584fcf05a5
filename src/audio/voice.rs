//! Songbird-backed voice transport.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client as HttpClient;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::YoutubeDl,
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::{
    audio::{
        track::Track,
        transport::{TrackEndNotifier, TransportStatus, VoiceConnection, VoiceGateway},
    },
    error::{MusicError, MusicResult},
};

/// Joins voice channels through the songbird manager.
pub struct SongbirdGateway {
    manager: Arc<Songbird>,
    http: HttpClient,
    ytdlp: &'static str,
}

impl SongbirdGateway {
    /// `ytdlp` is the program songbird runs to open streams
    pub fn new(manager: Arc<Songbird>, http: HttpClient, ytdlp: &'static str) -> Self {
        Self { manager, http, ytdlp }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<Arc<dyn VoiceConnection>> {
        let call = self.manager.join(guild_id, channel_id).await.map_err(|e| {
            error!("Error joining voice channel {}: {:?}", channel_id, e);
            MusicError::Transport(format!("could not join voice channel: {}", e))
        })?;

        {
            let mut handler = call.lock().await;
            if let Err(e) = handler.deafen(true).await {
                debug!("Could not self-deafen in guild {}: {}", guild_id, e);
            }
        }

        Ok(Arc::new(SongbirdConnection {
            guild_id,
            manager: self.manager.clone(),
            call,
            http: self.http.clone(),
            ytdlp: self.ytdlp,
            current: Mutex::new(None),
        }))
    }
}

/// One guild's call plus the handle of the track it is streaming.
pub struct SongbirdConnection {
    guild_id: GuildId,
    manager: Arc<Songbird>,
    call: Arc<tokio::sync::Mutex<Call>>,
    http: HttpClient,
    ytdlp: &'static str,
    current: Mutex<Option<TrackHandle>>,
}

impl SongbirdConnection {
    fn current(&self) -> MusicResult<TrackHandle> {
        self.current
            .lock()
            .clone()
            .ok_or_else(|| MusicError::Transport("no track loaded".to_string()))
    }
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    async fn play(&self, track: &Track, on_end: TrackEndNotifier) -> MusicResult<()> {
        let input = YoutubeDl::new_ytdl_like(self.ytdlp, self.http.clone(), track.url.clone());

        let handle = {
            let mut call = self.call.lock().await;
            call.play_only_input(input.into())
        };

        let handler = TrackEndHandler { notifier: on_end };
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(Event::Track(event), handler.clone())
                .map_err(|e| MusicError::Transport(format!("could not watch track: {}", e)))?;
        }

        *self.current.lock() = Some(handle);
        Ok(())
    }

    async fn pause(&self) -> MusicResult<()> {
        self.current()?
            .pause()
            .map_err(|e| MusicError::Transport(e.to_string()))
    }

    async fn resume(&self) -> MusicResult<()> {
        self.current()?
            .play()
            .map_err(|e| MusicError::Transport(e.to_string()))
    }

    async fn stop(&self) -> MusicResult<()> {
        let handle = self.current.lock().take();
        match handle {
            Some(handle) => handle.stop().map_err(|e| MusicError::Transport(e.to_string())),
            None => Ok(()),
        }
    }

    async fn status(&self) -> TransportStatus {
        if self.call.lock().await.current_channel().is_none() {
            return TransportStatus::Disconnected;
        }

        let handle = self.current.lock().clone();
        let Some(handle) = handle else {
            return TransportStatus::Stopped;
        };

        match handle.get_info().await {
            Ok(state) => match state.playing {
                PlayMode::Play => TransportStatus::Playing,
                PlayMode::Pause => TransportStatus::Paused,
                _ => TransportStatus::Stopped,
            },
            Err(_) => TransportStatus::Stopped,
        }
    }

    async fn disconnect(&self) -> MusicResult<()> {
        self.current.lock().take();
        self.manager
            .remove(self.guild_id)
            .await
            .map_err(|e| MusicError::Transport(format!("could not leave voice: {}", e)))?;

        info!("👋 Voice connection closed in guild {}", self.guild_id);
        Ok(())
    }
}

/// Fires the track's completion notifier on end or error.
#[derive(Clone)]
struct TrackEndHandler {
    notifier: TrackEndNotifier,
}

#[async_trait]
impl VoiceEventHandler for TrackEndHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let mut error = None;
        if let EventContext::Track(tracks) = ctx {
            for (state, _handle) in *tracks {
                if let PlayMode::Errored(e) = &state.playing {
                    error = Some(e.to_string());
                }
            }
        }

        debug!(
            "Track ended (generation {}, error: {:?})",
            self.notifier.generation(),
            error
        );
        self.notifier.notify(error);

        None
    }
}
