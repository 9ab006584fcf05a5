use anyhow::Context as _;
use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::Extractor;
use crate::{
    audio::track::Track,
    error::{MusicError, MusicResult},
};

const UNKNOWN_TITLE: &str = "Unknown title";

/// Extractor basado en el binario `yt-dlp`.
///
/// Cada búsqueda corre como proceso hijo; un semáforo limita cuántos
/// corren a la vez.
pub struct YtDlpExtractor {
    binary: String,
    max_playlist_size: usize,
    workers: Semaphore,
}

/// Subconjunto del JSON de yt-dlp que usamos
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    webpage_url: Option<String>,
    url: Option<String>,
    thumbnail: Option<String>,
    thumbnails: Option<Vec<Thumbnail>>,
    duration: Option<f64>,
    entries: Option<Vec<Option<YtDlpInfo>>>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl YtDlpInfo {
    fn into_track(self) -> Option<Track> {
        let url = self.webpage_url.or(self.url)?;
        let thumbnail = self
            .thumbnail
            .or_else(|| self.thumbnails.and_then(|t| t.into_iter().last()).map(|t| t.url));
        let duration = self
            .duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or_default();

        let mut track = Track::new(url, self.title.unwrap_or_else(|| UNKNOWN_TITLE.to_string()))
            .with_duration(duration);
        if let Some(thumbnail) = thumbnail {
            track = track.with_thumbnail(thumbnail);
        }
        Some(track)
    }
}

impl YtDlpExtractor {
    pub fn new(binary: impl Into<String>, max_playlist_size: usize, workers: usize) -> Self {
        Self {
            binary: binary.into(),
            max_playlist_size,
            workers: Semaphore::new(workers.max(1)),
        }
    }

    /// Verifica que el binario funcione y devuelve su versión
    pub async fn verify(&self) -> anyhow::Result<String> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .with_context(|| format!("could not run {}", self.binary))?;

        if !output.status.success() {
            anyhow::bail!("{} --version exited with {}", self.binary, output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn run(&self, args: &[&str]) -> MusicResult<String> {
        let _permit = self
            .workers
            .acquire()
            .await
            .map_err(|e| MusicError::Extraction(e.to_string()))?;

        debug!("🔧 {} {}", self.binary, args.join(" "));

        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| MusicError::Extraction(format!("failed to run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("❌ yt-dlp falló: {}", stderr.trim());
            return Err(MusicError::Extraction(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    async fn resolve_track(&self, query: &str) -> MusicResult<Track> {
        let target = search_target(query);
        info!("🔍 Resolviendo: {}", target);

        let stdout = self
            .run(&[
                "--dump-json",
                "--no-playlist",
                "--default-search",
                "auto",
                "-f",
                "bestaudio/worst",
                "--quiet",
                "--no-warnings",
                &target,
            ])
            .await?;

        parse_track(&stdout)
    }

    async fn resolve_playlist(&self, url: &str) -> MusicResult<Vec<Track>> {
        info!("📋 Resolviendo playlist: {}", url);

        let playlist_end = self.max_playlist_size.to_string();
        let stdout = self
            .run(&[
                "--flat-playlist",
                "--dump-json",
                "--playlist-end",
                &playlist_end,
                "--quiet",
                "--no-warnings",
                url,
            ])
            .await?;

        let tracks = parse_playlist(&stdout, self.max_playlist_size);
        if tracks.is_empty() {
            return Err(MusicError::EmptyResult);
        }
        info!("📋 Playlist resuelta con {} tracks", tracks.len());
        Ok(tracks)
    }
}

/// El texto libre se convierte en una búsqueda de YouTube con un resultado
fn search_target(query: &str) -> String {
    let query = query.trim();
    if query.starts_with("http") {
        query.to_string()
    } else {
        format!("ytsearch1:{}", query)
    }
}

fn parse_track(stdout: &str) -> MusicResult<Track> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or(MusicError::EmptyResult)?;

    let mut info: YtDlpInfo = serde_json::from_str(line)
        .map_err(|e| MusicError::Extraction(format!("unexpected yt-dlp output: {}", e)))?;

    let info = match info.entries.take() {
        Some(entries) => entries
            .into_iter()
            .flatten()
            .next()
            .ok_or(MusicError::EmptyResult)?,
        None => info,
    };

    info.into_track()
        .ok_or_else(|| MusicError::Extraction("result has no URL".to_string()))
}

/// Un objeto JSON por línea; las `entries` anidadas se aplanan en orden
fn parse_playlist(stdout: &str, limit: usize) -> Vec<Track> {
    let mut tracks = Vec::new();

    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let mut info: YtDlpInfo = match serde_json::from_str(line) {
            Ok(info) => info,
            Err(e) => {
                debug!("Omitiendo entrada de playlist inválida: {}", e);
                continue;
            }
        };

        match info.entries.take() {
            Some(entries) => tracks.extend(entries.into_iter().flatten().filter_map(YtDlpInfo::into_track)),
            None => tracks.extend(info.into_track()),
        }
    }

    tracks.truncate(limit);
    tracks
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_search_target() {
        assert_eq!(search_target("lofi beats"), "ytsearch1:lofi beats");
        assert_eq!(
            search_target(" https://yt.example/watch?v=abc "),
            "https://yt.example/watch?v=abc"
        );
    }

    #[test]
    fn test_parse_single_video() {
        let stdout = r#"{"title":"Song","webpage_url":"https://yt.example/watch?v=abc","thumbnail":"https://img.example/abc.jpg","duration":125.0}"#;

        let track = parse_track(stdout).unwrap();
        assert_eq!(
            track,
            Track::new("https://yt.example/watch?v=abc", "Song")
                .with_thumbnail("https://img.example/abc.jpg")
                .with_duration(Duration::from_secs(125))
        );
    }

    #[test]
    fn test_parse_search_wrapper_takes_first_entry() {
        let stdout = r#"{"entries":[null,{"webpage_url":"https://yt.example/watch?v=first"},{"webpage_url":"https://yt.example/watch?v=second","title":"Second"}]}"#;

        let track = parse_track(stdout).unwrap();
        assert_eq!(track.url, "https://yt.example/watch?v=first");
        assert_eq!(track.title, UNKNOWN_TITLE);
        assert_eq!(track.duration, Duration::ZERO);
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(matches!(parse_track("\n\n"), Err(MusicError::EmptyResult)));
        assert!(matches!(parse_track(r#"{"entries":[]}"#), Err(MusicError::EmptyResult)));
        assert!(matches!(parse_track("not json"), Err(MusicError::Extraction(_))));
    }

    #[test]
    fn test_parse_flat_playlist() {
        let stdout = concat!(
            r#"{"title":"One","url":"https://yt.example/watch?v=1","duration":61,"thumbnails":[{"url":"small"},{"url":"large"}]}"#,
            "\n",
            "garbage\n",
            r#"{"title":"Two","url":"https://yt.example/watch?v=2","duration":null}"#,
            "\n",
            r#"{"title":"No url"}"#,
            "\n",
        );

        let tracks = parse_playlist(stdout, 100);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].title, "One");
        assert_eq!(tracks[0].thumbnail.as_deref(), Some("large"));
        assert_eq!(tracks[0].duration, Duration::from_secs(61));
        assert_eq!(tracks[1].url, "https://yt.example/watch?v=2");
        assert!(!tracks[1].has_known_duration());
    }

    #[test]
    fn test_parse_playlist_respects_limit() {
        let stdout = (0..10)
            .map(|i| format!(r#"{{"url":"https://yt.example/watch?v={}"}}"#, i))
            .collect::<Vec<_>>()
            .join("\n");

        let tracks = parse_playlist(&stdout, 3);
        assert_eq!(tracks.len(), 3);
        assert_eq!(tracks[2].url, "https://yt.example/watch?v=2");
    }
}
