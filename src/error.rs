use serenity::model::id::GuildId;
use thiserror::Error;

/// Failures surfaced by the playback core.
///
/// Everything here is expected at runtime: the command layer turns these
/// into replies, the background loops log them and carry on.
#[derive(Debug, Error)]
pub enum MusicError {
    /// The requester is not connected to any voice channel
    #[error("you need to be in a voice channel")]
    NoVoiceChannel,

    /// The session holds no voice connection
    #[error("not connected to a voice channel")]
    NotConnected,

    #[error("nothing is playing")]
    NothingPlaying,

    #[error("nothing is paused")]
    NotPaused,

    /// yt-dlp could not be run or its output could not be parsed
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// The lookup succeeded but matched nothing
    #[error("no results found")]
    EmptyResult,

    /// The voice transport rejected an operation or a track failed
    #[error("voice transport error: {0}")]
    Transport(String),

    /// The now-playing message was deleted
    #[error("status message no longer exists")]
    DisplayGone,

    #[error("guild {0} is not cached")]
    GuildUnavailable(GuildId),

    #[error("discord error: {0}")]
    Discord(#[from] serenity::Error),
}

pub type MusicResult<T> = std::result::Result<T, MusicError>;
