use std::time::Duration;

/// A resolved, playable item.
///
/// Built once by the extractor and never modified afterwards. A zero
/// `duration` means the length is unknown (live streams, some flat
/// playlist entries).
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub url: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub duration: Duration,
}

impl Track {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            thumbnail: None,
            duration: Duration::ZERO,
        }
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn has_known_duration(&self) -> bool {
        !self.duration.is_zero()
    }
}
