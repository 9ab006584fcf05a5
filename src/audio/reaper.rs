//! Disconnects sessions whose voice channel has been left without listeners.

use serenity::{
    cache::Cache,
    model::{
        id::{ChannelId, GuildId, UserId},
        voice::VoiceState,
    },
};
use std::{sync::Arc, time::Duration};
use tokio::{sync::Notify, time::Instant};
use tracing::{debug, info, warn};

use crate::{
    audio::{registry::SessionRegistry, session::PlaybackSession},
    error::{MusicError, MusicResult},
};

/// Counts the non-bot members of a voice channel.
pub trait MembershipProbe: Send + Sync {
    fn human_members(&self, guild_id: GuildId, channel_id: ChannelId) -> MusicResult<usize>;
}

/// Reads voice states from the gateway cache.
pub struct CacheMembership {
    cache: Arc<Cache>,
}

impl CacheMembership {
    pub fn new(cache: Arc<Cache>) -> Self {
        Self { cache }
    }
}

impl MembershipProbe for CacheMembership {
    fn human_members(&self, guild_id: GuildId, channel_id: ChannelId) -> MusicResult<usize> {
        let bot_id = self.cache.current_user().id;
        let guild = self
            .cache
            .guild(guild_id)
            .ok_or(MusicError::GuildUnavailable(guild_id))?;

        let count = count_listeners(guild.voice_states.values(), channel_id, bot_id, |state| {
            state
                .member
                .as_ref()
                .map(|member| member.user.bot)
                .or_else(|| guild.members.get(&state.user_id).map(|m| m.user.bot))
                .unwrap_or(false)
        });

        Ok(count)
    }
}

/// Voice states in `channel_id` that belong neither to us nor to another bot.
fn count_listeners<'a>(
    states: impl IntoIterator<Item = &'a VoiceState>,
    channel_id: ChannelId,
    bot_id: UserId,
    is_bot: impl Fn(&VoiceState) -> bool,
) -> usize {
    states
        .into_iter()
        .filter(|state| state.channel_id == Some(channel_id))
        .filter(|state| state.user_id != bot_id)
        .filter(|state| !is_bot(state))
        .count()
}

pub struct IdleReaper {
    registry: Arc<SessionRegistry>,
    probe: Arc<dyn MembershipProbe>,
    timeout: Duration,
    poll_interval: Duration,
    wake: Notify,
}

impl IdleReaper {
    pub fn new(
        registry: Arc<SessionRegistry>,
        probe: Arc<dyn MembershipProbe>,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            registry,
            probe,
            timeout,
            poll_interval,
            wake: Notify::new(),
        }
    }

    /// Requests an early sweep, e.g. after someone left a voice channel
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Sweeps forever at the poll interval.
    pub async fn run(self: Arc<Self>) {
        info!(
            "🧹 Idle reaper started (timeout {:?}, poll {:?})",
            self.timeout, self.poll_interval
        );

        loop {
            self.sweep(Instant::now()).await;

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = self.wake.notified() => debug!("Idle reaper woken early"),
            }
        }
    }

    /// One pass over every connected session. Returns how many were disconnected.
    pub async fn sweep(&self, now: Instant) -> usize {
        let mut disconnected = 0;

        for session in self.registry.sessions() {
            match self.check(&session, now).await {
                Ok(true) => disconnected += 1,
                Ok(false) => {}
                Err(e) => warn!("Idle check failed for guild {}: {}", session.guild_id(), e),
            }
        }

        if disconnected > 0 {
            info!("🧹 Disconnected {} idle sessions", disconnected);
        }
        disconnected
    }

    async fn check(&self, session: &PlaybackSession, now: Instant) -> MusicResult<bool> {
        if !session.is_connected() {
            return Ok(false);
        }
        let Some(channel_id) = session.voice_channel() else {
            return Ok(false);
        };

        let humans = self.probe.human_members(session.guild_id(), channel_id)?;
        if humans > 0 {
            if session.idle_since().is_some() {
                debug!("Listeners are back in guild {}", session.guild_id());
                session.set_idle_since(None);
            }
            return Ok(false);
        }

        match session.idle_since() {
            None => {
                debug!("Voice channel empty in guild {}, starting countdown", session.guild_id());
                session.set_idle_since(Some(now));
                Ok(false)
            }
            Some(since) if now.saturating_duration_since(since) > self.timeout => {
                info!("⏰ Leaving idle voice channel in guild {}", session.guild_id());
                session.leave().await?;
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }
}
