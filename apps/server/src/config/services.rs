use serde::Deserialize;

#[derive(Deserialize)]
pub struct ServicesConfig {
    /// Minimal delay between two chat messages, in milliseconds.
    #[serde(default = "default_chat_cooldown_ms")]
    pub chat_cooldown_ms: u64,

    /// Delay between both players ready and the minigame start, in
    /// milliseconds.
    #[serde(default = "default_lobby_countdown_ms")]
    pub lobby_countdown_ms: u64,
}

fn default_chat_cooldown_ms() -> u64 {
    2000
}

fn default_lobby_countdown_ms() -> u64 {
    5000
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            chat_cooldown_ms: default_chat_cooldown_ms(),
            lobby_countdown_ms: default_lobby_countdown_ms(),
        }
    }
}
