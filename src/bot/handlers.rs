use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    audio::player::PlayOutcome,
    bot::JukeboxBot,
    error::MusicError,
    ui::{display::DiscordStatusChannel, embeds},
};

/// Maneja los comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &JukeboxBot) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 /{} usado por {} en {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, guild_id, bot).await?,
        "pause" => handle_pause(ctx, &command, guild_id, bot).await?,
        "resume" => handle_resume(ctx, &command, guild_id, bot).await?,
        "skip" => handle_skip(ctx, &command, guild_id, bot).await?,
        "stop" => handle_stop(ctx, &command, guild_id, bot).await?,
        "queue" => handle_queue(ctx, &command, guild_id, bot).await?,
        "clear" => handle_clear(ctx, &command, guild_id, bot).await?,
        "leave" => handle_leave(ctx, &command, guild_id, bot).await?,
        _ => respond_text(ctx, &command, "❌ Unknown command", true).await?,
    }

    Ok(())
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &JukeboxBot,
) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .map(str::trim)
        .filter(|query| !query.is_empty());

    // `/play` sin búsqueda reanuda
    let Some(query) = query else {
        return handle_resume(ctx, command, guild_id, bot).await;
    };

    // Solo hace falta si el bot aún no está conectado; lo decide el player
    let voice_channel = get_user_voice_channel(ctx, guild_id, command.user.id);

    // La extracción puede tardar
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let status = Arc::new(DiscordStatusChannel::new(ctx.http.clone(), command.channel_id));

    let embed = match bot.player.play(guild_id, query, voice_channel, status).await {
        Ok(PlayOutcome::Started(track)) => embeds::create_track_started_embed(&track),
        Ok(PlayOutcome::Queued { track, position }) => {
            embeds::create_track_queued_embed(&track, position)
        }
        Ok(PlayOutcome::Playlist { started, queued }) => {
            embeds::create_playlist_added_embed(started.as_ref(), queued)
        }
        Err(e) => error_embed(&e),
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    Ok(())
}

async fn handle_pause(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &JukeboxBot,
) -> Result<()> {
    match bot.player.pause(guild_id).await {
        Ok(track) => respond_text(ctx, command, &format!("⏸️ Paused **{}**", track.title), false).await,
        Err(e) => respond_error(ctx, command, &e).await,
    }
}

async fn handle_resume(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &JukeboxBot,
) -> Result<()> {
    match bot.player.resume(guild_id).await {
        Ok(track) => respond_text(ctx, command, &format!("▶️ Resumed **{}**", track.title), false).await,
        Err(e) => respond_error(ctx, command, &e).await,
    }
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &JukeboxBot,
) -> Result<()> {
    match bot.player.skip(guild_id).await {
        Ok(track) => respond_text(ctx, command, &format!("⏭️ Skipped **{}**", track.title), false).await,
        Err(e) => respond_error(ctx, command, &e).await,
    }
}

async fn handle_stop(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &JukeboxBot,
) -> Result<()> {
    match bot.player.stop(guild_id).await {
        Ok(()) => respond_text(ctx, command, "⏹️ Stopped playback and cleared the queue", false).await,
        Err(e) => respond_error(ctx, command, &e).await,
    }
}

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &JukeboxBot,
) -> Result<()> {
    let (preview, total) = bot.player.queue(guild_id, bot.config.queue_preview_limit);
    respond_embed(ctx, command, embeds::create_queue_embed(&preview, total), false).await
}

async fn handle_clear(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &JukeboxBot,
) -> Result<()> {
    let content = match bot.player.clear(guild_id) {
        0 => "📭 The queue is already empty".to_string(),
        1 => "🗑️ Removed 1 track from the queue".to_string(),
        removed => format!("🗑️ Removed {} tracks from the queue", removed),
    };
    respond_text(ctx, command, &content, false).await
}

async fn handle_leave(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &JukeboxBot,
) -> Result<()> {
    match bot.player.leave(guild_id).await {
        Ok(()) => respond_text(ctx, command, "👋 Disconnected from the voice channel", false).await,
        Err(e) => respond_error(ctx, command, &e).await,
    }
}

/// Obtiene el canal de voz del usuario desde el caché
fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

fn error_embed(error: &MusicError) -> CreateEmbed {
    let title = match error {
        MusicError::NoVoiceChannel | MusicError::NotConnected => "Not in voice",
        MusicError::NothingPlaying | MusicError::NotPaused => "Nothing to do",
        MusicError::Extraction(_) | MusicError::EmptyResult => "Could not load that",
        _ => "Something went wrong",
    };

    if !matches!(
        error,
        MusicError::NoVoiceChannel
            | MusicError::NotConnected
            | MusicError::NothingPlaying
            | MusicError::NotPaused
            | MusicError::EmptyResult
    ) {
        warn!("⚠️ Falló el comando: {}", error);
    }

    embeds::create_error_embed(title, &capitalize(&error.to_string()))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

async fn respond_error(ctx: &Context, command: &CommandInteraction, error: &MusicError) -> Result<()> {
    respond_embed(ctx, command, error_embed(error), true).await
}

async fn respond_text(
    ctx: &Context,
    command: &CommandInteraction,
    content: &str,
    ephemeral: bool,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}

async fn respond_embed(
    ctx: &Context,
    command: &CommandInteraction,
    embed: CreateEmbed,
    ephemeral: bool,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}
