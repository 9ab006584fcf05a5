use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::{audio::track::Track, ui::display::NowPlayingView};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SPOTIFY_GREEN: Colour = Colour::new(0x1DB954);
    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
}

const STANDARD_FOOTER: &str = "🎵 Progressive Jukebox";

/// Embed de la canción actual, editado en vivo por el reporter de progreso
pub fn create_progress_embed(view: &NowPlayingView) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Now Playing")
        .description(format!("**{}**", view.title))
        .color(colors::SPOTIFY_GREEN)
        .field(view.status.as_str(), format!("```{}```", view.progress_line), false);

    if let Some(thumbnail) = &view.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed
}

/// Crea un embed para una canción que empezó de inmediato
pub fn create_track_started_embed(track: &Track) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("▶️ Now playing")
        .description(format!("**{}**", track.title))
        .color(colors::SPOTIFY_GREEN)
        .url(&track.url)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

    if let Some(thumbnail) = &track.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed
}

/// Crea un embed para mostrar que se agregó una canción
pub fn create_track_queued_embed(track: &Track, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📝 Added to queue")
        .description(format!("**{}**", track.title))
        .color(colors::SUCCESS_GREEN)
        .field("📍 Position", position.to_string(), true)
        .url(&track.url)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

    if let Some(thumbnail) = &track.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed
}

/// Crea un embed para mostrar que una playlist fue agregada
pub fn create_playlist_added_embed(started: Option<&Track>, queued: usize) -> CreateEmbed {
    let description = match started {
        Some(track) if queued > 0 => format!(
            "▶️ Now playing: **{}**\n📝 {} tracks added to the queue",
            track.title, queued
        ),
        Some(track) => format!("▶️ Now playing from the playlist: **{}**", track.title),
        None => format!("📝 {} tracks added to the queue", queued),
    };

    CreateEmbed::default()
        .title("🎵 Playlist added!")
        .description(description)
        .color(colors::MUSIC_PURPLE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar la cola de reproducción
pub fn create_queue_embed(preview: &[Track], total: usize) -> CreateEmbed {
    CreateEmbed::default()
        .title("📝 Queue")
        .description(format_queue_listing(preview, total))
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Vista numerada del inicio de la cola más el total.
pub fn format_queue_listing(preview: &[Track], total: usize) -> String {
    if total == 0 {
        return "Queue is empty!".to_string();
    }

    let mut listing = preview
        .iter()
        .enumerate()
        .map(|(i, track)| format!("{}. {}", i + 1, track.title))
        .collect::<Vec<_>>()
        .join("\n");

    if total > preview.len() {
        listing.push_str(&format!("\n... and {} more", total - preview.len()));
    }

    listing.push_str(&format!("\n\n**Total: {} tracks in queue**", total));
    listing
}
