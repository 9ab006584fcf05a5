//! The now-playing message: what gets rendered and where it goes.

use async_trait::async_trait;
use serenity::{
    builder::{CreateMessage, EditMessage},
    http::{Http, HttpError},
    model::{channel::Message, id::ChannelId},
};
use std::{sync::Arc, time::Duration};

use crate::{
    audio::{track::Track, transport::TransportStatus},
    error::{MusicError, MusicResult},
    ui::{embeds, progress_bar::Progress},
};

/// Discord's JSON error code for a deleted message
const UNKNOWN_MESSAGE: isize = 10008;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLabel {
    Playing,
    Paused,
    Disconnected,
}

impl StatusLabel {
    pub fn from_transport(status: TransportStatus) -> Self {
        match status {
            TransportStatus::Paused => StatusLabel::Paused,
            TransportStatus::Disconnected => StatusLabel::Disconnected,
            TransportStatus::Playing | TransportStatus::Stopped => StatusLabel::Playing,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusLabel::Playing => "▶️ Playing",
            StatusLabel::Paused => "⏸️ Paused",
            StatusLabel::Disconnected => "🔇 Disconnected",
        }
    }
}

/// Everything one render of the now-playing display shows.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlayingView {
    pub title: String,
    pub thumbnail: Option<String>,
    pub status: StatusLabel,
    /// Progress bar followed by `elapsed / total`
    pub progress_line: String,
}

impl NowPlayingView {
    pub fn render(track: &Track, elapsed: Duration, status: StatusLabel, bar_length: usize) -> Self {
        Self {
            title: track.title.clone(),
            thumbnail: track.thumbnail.clone(),
            status,
            progress_line: Progress::new(elapsed, track.duration).render(bar_length),
        }
    }
}

/// Text channel the display is posted to.
#[async_trait]
pub trait StatusChannel: Send + Sync {
    async fn send(&self, view: &NowPlayingView) -> MusicResult<Box<dyn StatusMessage>>;
}

/// A posted display that can be edited in place.
#[async_trait]
pub trait StatusMessage: Send + Sync {
    /// Fails with [`MusicError::DisplayGone`] once the message was deleted.
    async fn edit(&mut self, view: &NowPlayingView) -> MusicResult<()>;
}

/// Posts embeds to a guild text channel.
pub struct DiscordStatusChannel {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl DiscordStatusChannel {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl StatusChannel for DiscordStatusChannel {
    async fn send(&self, view: &NowPlayingView) -> MusicResult<Box<dyn StatusMessage>> {
        let message = self
            .channel_id
            .send_message(
                &self.http,
                CreateMessage::new().embed(embeds::create_progress_embed(view)),
            )
            .await?;

        Ok(Box::new(DiscordStatusMessage {
            http: self.http.clone(),
            message,
        }))
    }
}

struct DiscordStatusMessage {
    http: Arc<Http>,
    message: Message,
}

#[async_trait]
impl StatusMessage for DiscordStatusMessage {
    async fn edit(&mut self, view: &NowPlayingView) -> MusicResult<()> {
        self.message
            .edit(
                &self.http,
                EditMessage::new().embed(embeds::create_progress_embed(view)),
            )
            .await
            .map_err(|e| {
                if is_unknown_message(&e) {
                    MusicError::DisplayGone
                } else {
                    MusicError::Discord(e)
                }
            })
    }
}

fn is_unknown_message(error: &serenity::Error) -> bool {
    match error {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) => {
            response.status_code.as_u16() == 404 || response.error.code == UNKNOWN_MESSAGE
        }
        _ => false,
    }
}
