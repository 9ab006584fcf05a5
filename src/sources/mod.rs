pub mod ytdlp;

use async_trait::async_trait;

use crate::{audio::track::Track, error::MusicResult};

pub use ytdlp::YtDlpExtractor;

/// Marcadores que identifican un enlace de playlist
const PLAYLIST_INDICATORS: [&str; 2] = ["playlist?list=", "/playlist?"];

/// Convierte búsquedas y enlaces en metadata de [`Track`].
///
/// Las implementaciones hacen I/O de red y pueden tardar segundos; la
/// sesión solo se toca cuando terminan.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Resuelve una URL o una búsqueda de texto a un solo track
    async fn resolve_track(&self, query: &str) -> MusicResult<Track>;

    /// Resuelve todas las entradas de una playlist, en su orden
    async fn resolve_playlist(&self, url: &str) -> MusicResult<Vec<Track>>;
}

/// Si `url` debe cargarse como playlist
pub fn is_playlist_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    PLAYLIST_INDICATORS
        .iter()
        .any(|indicator| lower.contains(indicator))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playlist_url_detection() {
        assert!(is_playlist_url("https://yt.example/playlist?list=PL123"));
        assert!(is_playlist_url("https://www.youtube.com/watch?v=abc&playlist?list=PL1"));
        assert!(is_playlist_url("HTTPS://YT.EXAMPLE/PLAYLIST?LIST=PL123"));
        assert!(is_playlist_url("https://music.example/playlist?id=9"));

        assert!(!is_playlist_url("https://yt.example/watch?v=abc"));
        assert!(!is_playlist_url("https://yt.example/watch?v=abc&list=PL123"));
        assert!(!is_playlist_url("never gonna give you up"));
    }
}
