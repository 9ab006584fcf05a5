use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
#[cfg(test)]
mod testing;
mod ui;

use crate::audio::{
    player::MusicPlayer,
    registry::{dispatch_track_events, SessionRegistry},
    session::PlaybackServices,
    voice::SongbirdGateway,
};
use crate::bot::{presence::ShardPresence, JukeboxBot};
use crate::config::Config;
use crate::sources::YtDlpExtractor;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("progressive_jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting Progressive Jukebox v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("{}", config.summary());

    let extractor = Arc::new(YtDlpExtractor::new(
        config.ytdlp_path.clone(),
        config.max_playlist_size,
        config.extractor_workers,
    ));

    if std::env::args().any(|arg| arg == "--health-check") {
        let version = extractor.verify().await?;
        println!("OK (yt-dlp {})", version);
        return Ok(());
    }

    match extractor.verify().await {
        Ok(version) => info!("✅ yt-dlp {} available", version),
        Err(e) => error!("❌ yt-dlp is not usable, playback requests will fail: {:?}", e),
    }

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let songbird = Songbird::serenity();
    let ytdlp: &'static str = Box::leak(config.ytdlp_path.clone().into_boxed_str());
    let gateway = Arc::new(SongbirdGateway::new(
        songbird.clone(),
        reqwest::Client::new(),
        ytdlp,
    ));

    let presence = Arc::new(ShardPresence::new());
    let (track_events, track_event_rx) = mpsc::unbounded_channel();
    let registry = Arc::new(SessionRegistry::new(PlaybackServices {
        gateway,
        presence: presence.clone(),
        track_events,
        reporter: config.reporter_settings(),
    }));

    let player = Arc::new(MusicPlayer::new(registry.clone(), extractor));
    let handler = JukeboxBot::new(Arc::new(config.clone()), player, presence);

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    tokio::spawn(dispatch_track_events(registry, track_event_rx));

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("⚠️ Shutdown signal received, exiting...");
            std::process::exit(0);
        }
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
