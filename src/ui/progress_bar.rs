use std::time::Duration;

const FILL: char = '━';
const HEAD: char = '◉';

/// Progress of the current track, as rendered in the now-playing embed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub elapsed: Duration,
    pub total: Duration,
}

impl Progress {
    pub fn new(elapsed: Duration, total: Duration) -> Self {
        Self { elapsed, total }
    }

    /// Percentage in `[0, 100]`; zero for live/unknown tracks.
    pub fn percent(&self) -> f64 {
        if self.total.is_zero() {
            return 0.0;
        }
        (self.elapsed.as_secs_f64() / self.total.as_secs_f64() * 100.0).min(100.0)
    }

    /// `elapsed / total`, hours included once the track reaches one hour.
    pub fn time_label(&self) -> String {
        if self.total.is_zero() {
            return "00:00 / 00:00".to_string();
        }

        let with_hours = self.total.as_secs() >= 3600;
        let elapsed = self.elapsed.min(self.total);
        format!(
            "{} / {}",
            format_clock(elapsed, with_hours),
            format_clock(self.total, with_hours)
        )
    }

    /// Bar of `length` cells followed by the time label.
    pub fn render(&self, length: usize) -> String {
        if self.total.is_zero() {
            return format!("{} {}", FILL.to_string().repeat(length), self.time_label());
        }
        format!("{} {}", render_bar(self.percent(), length), self.time_label())
    }
}

/// Fill glyphs with a single head glyph at the filled boundary.
pub fn render_bar(percent: f64, length: usize) -> String {
    if length == 0 {
        return String::new();
    }

    let filled = ((percent / 100.0) * length as f64).floor().max(0.0) as usize;
    let fill = FILL.to_string();

    if filled >= length {
        format!("{}{}", fill.repeat(length - 1), HEAD)
    } else {
        format!("{}{}{}", fill.repeat(filled), HEAD, fill.repeat(length - filled - 1))
    }
}

/// `MM:SS`, or `HH:MM:SS` when `with_hours` is set.
pub fn format_clock(duration: Duration, with_hours: bool) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if with_hours {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bar_at_start_puts_head_first() {
        let bar = render_bar(0.0, 25);
        assert_eq!(bar.chars().count(), 25);
        assert_eq!(bar.chars().next(), Some(HEAD));
        assert_eq!(bar.chars().filter(|c| *c == FILL).count(), 24);
    }

    #[test]
    fn test_bar_at_end_puts_head_last() {
        let bar = render_bar(100.0, 25);
        assert_eq!(bar, format!("{}{}", "━".repeat(24), "◉"));
    }

    #[test]
    fn test_bar_head_sits_on_filled_boundary() {
        // floor(0.5 * 25) = 12 filled cells before the head
        let bar = render_bar(50.0, 25);
        assert_eq!(bar.chars().position(|c| c == HEAD), Some(12));
        assert_eq!(bar.chars().count(), 25);

        let bar = render_bar(99.9, 10);
        assert_eq!(bar.chars().position(|c| c == HEAD), Some(9));
    }

    #[test]
    fn test_time_label_minutes() {
        let progress = Progress::new(Duration::from_secs(65), Duration::from_secs(125));
        assert_eq!(progress.time_label(), "01:05 / 02:05");
    }

    #[test]
    fn test_time_label_switches_to_hours() {
        let progress = Progress::new(Duration::from_secs(61), Duration::from_secs(3723));
        assert_eq!(progress.time_label(), "00:01:01 / 01:02:03");
    }

    #[test]
    fn test_elapsed_is_clamped_to_total() {
        let progress = Progress::new(Duration::from_secs(400), Duration::from_secs(125));
        assert_eq!(progress.percent(), 100.0);
        assert_eq!(progress.time_label(), "02:05 / 02:05");
    }

    #[test]
    fn test_unknown_duration_renders_empty_track() {
        let progress = Progress::new(Duration::from_secs(30), Duration::ZERO);
        assert_eq!(progress.percent(), 0.0);
        assert_eq!(progress.render(5), "━━━━━ 00:00 / 00:00");
    }

    #[test]
    fn test_render_combines_bar_and_label() {
        let progress = Progress::new(Duration::from_secs(50), Duration::from_secs(100));
        let rendered = progress.render(25);
        assert!(rendered.ends_with(" 00:50 / 01:40"));
        // floor(50% of 25) = 12
        assert_eq!(rendered.chars().position(|c| c == HEAD), Some(12));
    }
}
