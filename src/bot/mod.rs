//! # Bot Module
//!
//! Discord-facing side of the jukebox: command registration, interaction
//! dispatch and voice-state tracking.
//!
//! [`JukeboxBot`] implements Serenity's [`EventHandler`]. Playback itself
//! lives in [`crate::audio`]; this layer only turns interactions into
//! [`MusicPlayer`] calls and results into replies.

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod handlers;
pub mod presence;

use crate::{
    audio::{
        player::MusicPlayer,
        reaper::{CacheMembership, IdleReaper},
    },
    bot::presence::{Presence, PresenceState, ShardPresence},
    config::Config,
    error::MusicError,
};

pub struct JukeboxBot {
    /// Bot configuration loaded from environment variables
    config: Arc<Config>,
    /// Resolves queries and drives per-guild sessions
    pub player: Arc<MusicPlayer>,
    presence: Arc<ShardPresence>,
    /// Started on the first `ready`, once the cache exists
    reaper: OnceLock<Arc<IdleReaper>>,
}

impl JukeboxBot {
    pub fn new(config: Arc<Config>, player: Arc<MusicPlayer>, presence: Arc<ShardPresence>) -> Self {
        Self {
            config,
            player,
            presence,
            reaper: OnceLock::new(),
        }
    }

    fn start_reaper(&self, ctx: &Context) {
        self.reaper.get_or_init(|| {
            let reaper = Arc::new(IdleReaper::new(
                self.player.registry().clone(),
                Arc::new(CacheMembership::new(ctx.cache.clone())),
                self.config.auto_disconnect_timeout,
                self.config.idle_check_interval,
            ));
            tokio::spawn(reaper.clone().run());
            reaper
        });
    }

    /// Registers slash commands, per guild when `GUILD_ID` is set.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registering slash commands...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                info!("🏠 Registering commands for guild {}", guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ Bot is not in the configured guild: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id)
                    .await
                    .map_err(|e| {
                        error!("❌ Error registering guild commands: {:?}", e);
                        anyhow::anyhow!("Could not register guild commands. Check the 'applications.commands' scope.")
                    })?;
                info!("✅ Guild commands registered for {}", guild_id);
            }
            None => {
                info!("🌐 Registering global commands");
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registering global commands: {:?}", e);
                    anyhow::anyhow!("Could not register global commands. Check the 'applications.commands' scope.")
                })?;
                info!("✅ Global commands registered");
            }
        }

        Ok(())
    }

    /// The bot's own voice state changed.
    async fn own_voice_state(&self, ctx: &Context, guild_id: GuildId, new: &VoiceState) {
        let Some(session) = self.player.registry().get(guild_id) else {
            return;
        };

        match new.channel_id {
            Some(channel_id) => session.follow_voice_channel(channel_id),
            None => {
                let still_in = ctx.cache.guild(guild_id).and_then(|guild| {
                    guild
                        .voice_states
                        .get(&new.user_id)
                        .and_then(|state| state.channel_id)
                });
                match session.handle_voice_disconnect(still_in).await {
                    Ok(()) | Err(MusicError::NotConnected) => {}
                    Err(e) => error!("Error cleaning up session in guild {}: {:?}", guild_id, e),
                }
            }
        }
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} guilds", ready.guilds.len());

        self.presence.attach(ctx.shard.clone());
        self.presence.set_activity(PresenceState::Idle);
        self.start_reaper(&ctx);

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error registering commands: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error handling command: {:?}", e);
            }
        }
    }

    /// Own moves and disconnects update the session; anything else only
    /// wakes the idle reaper, which decides about empty channels.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };

        if new.user_id == ctx.cache.current_user().id {
            self.own_voice_state(&ctx, guild_id, &new).await;
            return;
        }

        let left_channel = old.and_then(|state| state.channel_id);
        if left_channel.is_some() && left_channel != new.channel_id {
            debug!("User left voice channel in guild {}, waking reaper", guild_id);
            if let Some(reaper) = self.reaper.get() {
                reaper.wake();
            }
        }
    }
}
