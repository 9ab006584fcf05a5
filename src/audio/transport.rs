//! Seams between a playback session and the voice connection it drives.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::mpsc;
use tracing::debug;

use crate::{audio::track::Track, error::MusicResult};

/// What the transport is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    Playing,
    Paused,
    Stopped,
    Disconnected,
}

impl TransportStatus {
    /// A track is loaded and the connection is up.
    pub fn is_active(self) -> bool {
        matches!(self, TransportStatus::Playing | TransportStatus::Paused)
    }
}

/// Opens voice connections.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<Arc<dyn VoiceConnection>>;
}

/// An open voice connection able to stream one track at a time.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Starts `track`, replacing anything loaded. `on_end` must be fired
    /// once the track finishes, is stopped or fails.
    async fn play(&self, track: &Track, on_end: TrackEndNotifier) -> MusicResult<()>;

    async fn pause(&self) -> MusicResult<()>;

    async fn resume(&self) -> MusicResult<()>;

    async fn stop(&self) -> MusicResult<()>;

    async fn status(&self) -> TransportStatus;

    async fn disconnect(&self) -> MusicResult<()>;
}

/// Track completion, delivered to the dispatcher task.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackEnd {
    pub guild_id: GuildId,
    /// Load counter of the session when the track started
    pub generation: u64,
    pub error: Option<String>,
}

pub type TrackEndSender = mpsc::UnboundedSender<TrackEnd>;
pub type TrackEndReceiver = mpsc::UnboundedReceiver<TrackEnd>;

/// Single-shot completion callback handed to [`VoiceConnection::play`].
///
/// Clones share one fired flag, so registering the same notifier for
/// several transport events still yields exactly one [`TrackEnd`].
#[derive(Debug, Clone)]
pub struct TrackEndNotifier {
    guild_id: GuildId,
    generation: u64,
    sender: TrackEndSender,
    fired: Arc<AtomicBool>,
}

impl TrackEndNotifier {
    pub fn new(guild_id: GuildId, generation: u64, sender: TrackEndSender) -> Self {
        Self {
            guild_id,
            generation,
            sender,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Sends the completion event; later calls are ignored.
    pub fn notify(&self, error: Option<String>) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }

        let event = TrackEnd {
            guild_id: self.guild_id,
            generation: self.generation,
            error,
        };
        if self.sender.send(event).is_err() {
            debug!("Track end dispatcher is gone, dropping event for guild {}", self.guild_id);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_notifier_fires_once_across_clones() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier = TrackEndNotifier::new(GuildId::new(7), 3, tx);
        let twin = notifier.clone();

        assert!(notifier.notify(Some("decoder crashed".to_string())));
        assert!(!twin.notify(None));

        assert_eq!(
            rx.try_recv().ok(),
            Some(TrackEnd {
                guild_id: GuildId::new(7),
                generation: 3,
                error: Some("decoder crashed".to_string()),
            })
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_active_statuses() {
        assert!(TransportStatus::Playing.is_active());
        assert!(TransportStatus::Paused.is_active());
        assert!(!TransportStatus::Stopped.is_active());
        assert!(!TransportStatus::Disconnected.is_active());
    }
}
