use parking_lot::RwLock;
use serenity::{
    gateway::{ActivityData, ShardMessenger},
    model::user::OnlineStatus,
};
use tracing::debug;

const MAX_TITLE_CHARS: usize = 120;

/// Activity shown on the bot's profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceState {
    Listening { title: String, paused: bool },
    Idle,
}

impl PresenceState {
    pub fn listening(title: &str) -> Self {
        Self::Listening {
            title: title.chars().take(MAX_TITLE_CHARS).collect(),
            paused: false,
        }
    }

    pub fn paused(title: &str) -> Self {
        Self::Listening {
            title: title.chars().take(MAX_TITLE_CHARS).collect(),
            paused: true,
        }
    }

    pub fn label(&self) -> String {
        match self {
            PresenceState::Listening { title, paused: true } => format!("⏸️ {}", title),
            PresenceState::Listening { title, paused: false } => format!("🎵 {}", title),
            PresenceState::Idle => "🎵 Ready for music!".to_string(),
        }
    }
}

pub trait Presence: Send + Sync {
    fn set_activity(&self, state: PresenceState);
}

/// Presence updates sent through the shard once the gateway is ready.
#[derive(Default)]
pub struct ShardPresence {
    shard: RwLock<Option<ShardMessenger>>,
}

impl ShardPresence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the shard delivered with the `ready` event
    pub fn attach(&self, shard: ShardMessenger) {
        *self.shard.write() = Some(shard);
    }
}

impl Presence for ShardPresence {
    fn set_activity(&self, state: PresenceState) {
        let guard = self.shard.read();
        let Some(shard) = guard.as_ref() else {
            debug!("Presence update before ready, skipping: {:?}", state);
            return;
        };

        match &state {
            PresenceState::Listening { .. } => {
                shard.set_presence(Some(ActivityData::listening(state.label())), OnlineStatus::Online)
            }
            PresenceState::Idle => {
                shard.set_presence(Some(ActivityData::playing(state.label())), OnlineStatus::Idle)
            }
        }
    }
}
