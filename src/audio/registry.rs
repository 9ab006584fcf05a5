use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::{debug, info};

use crate::audio::{
    session::{PlaybackServices, PlaybackSession},
    transport::TrackEndReceiver,
};

/// Guild-keyed map of playback sessions, owned by the application.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<PlaybackSession>>,
    services: Arc<PlaybackServices>,
}

impl SessionRegistry {
    pub fn new(services: PlaybackServices) -> Self {
        Self {
            sessions: DashMap::new(),
            services: Arc::new(services),
        }
    }

    /// Returns the session of `guild_id`, creating it on first use.
    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<PlaybackSession> {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("Creating playback session for guild {}", guild_id);
                Arc::new(PlaybackSession::new(guild_id, self.services.clone()))
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<PlaybackSession>> {
        self.sessions.get(&guild_id).map(|entry| entry.clone())
    }

    /// Snapshot of every session; the map is not locked afterwards.
    pub fn sessions(&self) -> Vec<Arc<PlaybackSession>> {
        self.sessions.iter().map(|entry| entry.value().clone()).collect()
    }
}

/// Applies track-end events to their sessions, one at a time.
pub async fn dispatch_track_events(registry: Arc<SessionRegistry>, mut events: TrackEndReceiver) {
    info!("🎚️ Track event dispatcher started");

    while let Some(event) = events.recv().await {
        match registry.get(event.guild_id) {
            Some(session) => {
                session.handle_track_end(event).await;
            }
            None => debug!("Track end for unknown guild {}", event.guild_id),
        }
    }

    info!("Track event dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{track, Harness};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[tokio::test]
    async fn test_get_or_create_reuses_sessions() {
        let harness = Harness::new();
        let registry = &harness.registry;

        assert!(registry.get(GuildId::new(1)).is_none());
        let first = registry.get_or_create(GuildId::new(1));
        let again = registry.get_or_create(GuildId::new(1));
        registry.get_or_create(GuildId::new(2));

        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(registry.sessions().len(), 2);
        assert!(registry.get(GuildId::new(2)).is_some());
    }

    #[tokio::test]
    async fn test_dispatcher_advances_sessions() {
        let mut harness = Harness::new();
        let session = harness.connected_session().await;
        session.enqueue_tracks(vec![track("A"), track("B")]).await;

        let events = harness.take_events();
        let dispatcher = tokio::spawn(dispatch_track_events(harness.registry.clone(), events));

        harness.connection.finish_current(None);
        for _ in 0..50 {
            if session.current_track() == Some(track("B")) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(session.current_track(), Some(track("B")));
        dispatcher.abort();
    }
}
