use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tracing::info;

use crate::{
    audio::{
        registry::SessionRegistry,
        session::PlaybackSession,
        track::Track,
    },
    error::{MusicError, MusicResult},
    sources::{is_playlist_url, Extractor},
    ui::display::StatusChannel,
};

/// Resultado de una solicitud `play`.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayOutcome {
    Started(Track),
    Queued { track: Track, position: usize },
    Playlist { started: Option<Track>, queued: usize },
}

/// Punto de entrada de los comandos hacia la reproducción.
///
/// Resuelve las búsquedas con el [`Extractor`] antes de tocar la sesión,
/// así una búsqueda fallida deja el servidor tal como estaba.
pub struct MusicPlayer {
    registry: Arc<SessionRegistry>,
    extractor: Arc<dyn Extractor>,
}

impl MusicPlayer {
    pub fn new(registry: Arc<SessionRegistry>, extractor: Arc<dyn Extractor>) -> Self {
        Self { registry, extractor }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Resuelve `query`, se une a `voice_target` si hace falta y encola el resultado.
    pub async fn play(
        &self,
        guild_id: GuildId,
        query: &str,
        voice_target: Option<ChannelId>,
        status: Arc<dyn StatusChannel>,
    ) -> MusicResult<PlayOutcome> {
        let session = self.registry.get_or_create(guild_id);
        if !session.is_connected() && voice_target.is_none() {
            return Err(MusicError::NoVoiceChannel);
        }

        if is_playlist_url(query) {
            let tracks = self.extractor.resolve_playlist(query).await?;
            if tracks.is_empty() {
                return Err(MusicError::EmptyResult);
            }

            session.ensure_connected(voice_target).await?;
            session.bind_status_channel(status);
            let outcome = session.enqueue_tracks(tracks).await;

            let result = PlayOutcome::Playlist {
                started: outcome.started,
                queued: outcome.queued,
            };
            info!("🎶 Playlist solicitada en {} -> {:?}", guild_id, result);
            return Ok(result);
        }

        let track = self.extractor.resolve_track(query).await?;

        session.ensure_connected(voice_target).await?;
        session.bind_status_channel(status);

        let result = match session.enqueue_or_play(track.clone()).await.started {
            Some(started) => PlayOutcome::Started(started),
            None => PlayOutcome::Queued {
                track,
                position: session.queue_len(),
            },
        };

        info!("🎶 Reproducción solicitada en {} -> {:?}", guild_id, result);
        Ok(result)
    }

    pub async fn pause(&self, guild_id: GuildId) -> MusicResult<Track> {
        self.session(guild_id, MusicError::NothingPlaying)?.pause().await
    }

    pub async fn resume(&self, guild_id: GuildId) -> MusicResult<Track> {
        self.session(guild_id, MusicError::NotPaused)?.resume().await
    }

    pub async fn skip(&self, guild_id: GuildId) -> MusicResult<Track> {
        self.session(guild_id, MusicError::NothingPlaying)?.skip().await
    }

    pub async fn stop(&self, guild_id: GuildId) -> MusicResult<()> {
        self.session(guild_id, MusicError::NotConnected)?.stop().await
    }

    pub async fn leave(&self, guild_id: GuildId) -> MusicResult<()> {
        self.session(guild_id, MusicError::NotConnected)?.leave().await
    }

    /// Hasta `limit` próximos tracks y el largo total de la cola
    pub fn queue(&self, guild_id: GuildId, limit: usize) -> (Vec<Track>, usize) {
        match self.registry.get(guild_id) {
            Some(session) => (session.list_queue(limit), session.queue_len()),
            None => (Vec::new(), 0),
        }
    }

    pub fn clear(&self, guild_id: GuildId) -> usize {
        self.registry
            .get(guild_id)
            .map(|session| session.clear_queue())
            .unwrap_or(0)
    }

    fn session(&self, guild_id: GuildId, missing: MusicError) -> MusicResult<Arc<PlaybackSession>> {
        self.registry.get(guild_id).ok_or(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::session::SessionState,
        sources::MockExtractor,
        testing::{track, Harness},
    };
    use pretty_assertions::assert_eq;

    fn player(harness: &Harness, extractor: MockExtractor) -> MusicPlayer {
        MusicPlayer::new(harness.registry.clone(), Arc::new(extractor))
    }

    #[tokio::test]
    async fn test_play_without_voice_channel_skips_extraction() {
        let harness = Harness::new();
        let mut extractor = MockExtractor::new();
        extractor.expect_resolve_track().times(0);
        let player = player(&harness, extractor);

        let result = player
            .play(harness.guild_id, "lofi", None, harness.display.clone())
            .await;

        assert!(matches!(result, Err(MusicError::NoVoiceChannel)));
    }

    #[tokio::test]
    async fn test_play_starts_then_queues() {
        let harness = Harness::new();
        let mut extractor = MockExtractor::new();
        extractor
            .expect_resolve_track()
            .times(2)
            .returning(|query| Ok(track(query)));
        let player = player(&harness, extractor);

        let first = player
            .play(harness.guild_id, "A", Some(harness.voice_channel), harness.display.clone())
            .await
            .unwrap();
        assert_eq!(first, PlayOutcome::Started(track("A")));

        // already connected, no voice target needed
        let second = player
            .play(harness.guild_id, "B", None, harness.display.clone())
            .await
            .unwrap();
        assert_eq!(second, PlayOutcome::Queued { track: track("B"), position: 1 });

        let (preview, total) = player.queue(harness.guild_id, 5);
        assert_eq!(preview, vec![track("B")]);
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn test_play_reuses_connection_when_requester_is_not_in_voice() {
        let harness = Harness::new();
        harness.connected_session().await;
        let mut extractor = MockExtractor::new();
        extractor
            .expect_resolve_track()
            .times(1)
            .returning(|query| Ok(track(query)));
        let player = player(&harness, extractor);

        let outcome = player
            .play(harness.guild_id, "A", None, harness.display.clone())
            .await
            .unwrap();

        assert_eq!(outcome, PlayOutcome::Started(track("A")));
        assert_eq!(harness.gateway.connects(), 1);
    }

    #[tokio::test]
    async fn test_play_playlist() {
        let harness = Harness::new();
        let url = "https://yt.example/playlist?list=PL123";
        let mut extractor = MockExtractor::new();
        extractor.expect_resolve_track().times(0);
        extractor
            .expect_resolve_playlist()
            .withf(|query| query.contains("list=PL123"))
            .returning(|_| Ok(vec![track("A"), track("B"), track("C")]));
        let player = player(&harness, extractor);

        let outcome = player
            .play(harness.guild_id, url, Some(harness.voice_channel), harness.display.clone())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PlayOutcome::Playlist { started: Some(track("A")), queued: 2 }
        );
        assert_eq!(player.clear(harness.guild_id), 2);
    }

    #[tokio::test]
    async fn test_failed_extraction_leaves_session_untouched() {
        let harness = Harness::new();
        let mut extractor = MockExtractor::new();
        extractor
            .expect_resolve_track()
            .returning(|_| Err(MusicError::EmptyResult));
        extractor
            .expect_resolve_playlist()
            .returning(|_| Ok(Vec::new()));
        let player = player(&harness, extractor);

        let single = player
            .play(harness.guild_id, "nothing", Some(harness.voice_channel), harness.display.clone())
            .await;
        let playlist = player
            .play(
                harness.guild_id,
                "https://yt.example/playlist?list=EMPTY",
                Some(harness.voice_channel),
                harness.display.clone(),
            )
            .await;

        assert!(matches!(single, Err(MusicError::EmptyResult)));
        assert!(matches!(playlist, Err(MusicError::EmptyResult)));
        let session = harness.registry.get(harness.guild_id).unwrap();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(harness.gateway.connects(), 0);
    }

    #[tokio::test]
    async fn test_controls_on_unknown_guild() {
        let harness = Harness::new();
        let player = player(&harness, MockExtractor::new());
        let guild = GuildId::new(404);

        assert!(matches!(player.pause(guild).await, Err(MusicError::NothingPlaying)));
        assert!(matches!(player.resume(guild).await, Err(MusicError::NotPaused)));
        assert!(matches!(player.skip(guild).await, Err(MusicError::NothingPlaying)));
        assert!(matches!(player.stop(guild).await, Err(MusicError::NotConnected)));
        assert!(matches!(player.leave(guild).await, Err(MusicError::NotConnected)));
        assert_eq!(player.queue(guild, 5), (Vec::new(), 0));
        assert_eq!(player.clear(guild), 0);
        assert!(harness.registry.get(guild).is_none());
    }
}
