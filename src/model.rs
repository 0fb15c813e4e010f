//! Core domain types shared by the ledger, the presence tracker and the games.

use chrono::{DateTime, Utc};

/// Chat platform user identifier.
pub type UserId = u64;

/// Text or voice channel identifier.
pub type ChannelId = u64;

/// A chat message as delivered by the messaging gateway.
///
/// Commands are messages whose content starts with `!`; every message is also
/// forwarded to mini-games that are waiting for input.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub author: UserId,
    pub author_name: String,
    pub author_is_bot: bool,
    pub channel: ChannelId,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl ChatMessage {
    /// Trimmed message content.
    pub fn text(&self) -> &str {
        self.content.trim()
    }
}

/// A user's voice presence changed: joined, left, moved or toggled the mic.
#[derive(Debug, Clone)]
pub struct PresenceChange {
    pub user: UserId,
    pub display_name: String,
    pub previous: Option<ChannelId>,
    pub current: Option<ChannelId>,
    pub muted: bool,
    pub at: DateTime<Utc>,
}

/// Inputs of the bot, in the order the gateway observed them.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Message(ChatMessage),
    VoicePresenceChanged(PresenceChange),
}

impl GatewayEvent {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            GatewayEvent::Message(msg) => msg.at,
            GatewayEvent::VoicePresenceChanged(change) => change.at,
        }
    }
}

/// Render a user mention the way the chat platform expects it.
pub fn mention(user: UserId) -> String {
    format!("<@{user}>")
}

/// Parse a user reference, either a raw id or a `<@id>` / `<@!id>` mention.
pub fn parse_user_ref(token: &str) -> Option<UserId> {
    let trimmed = token
        .strip_prefix("<@")
        .and_then(|rest| rest.strip_suffix('>'))
        .map(|inner| inner.trim_start_matches('!'))
        .unwrap_or(token);
    trimmed.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_raw_and_mention_user_refs() {
        assert_eq!(parse_user_ref("42"), Some(42));
        assert_eq!(parse_user_ref("<@42>"), Some(42));
        assert_eq!(parse_user_ref("<@!42>"), Some(42));
        assert_eq!(parse_user_ref("@someone"), None);
        assert_eq!(parse_user_ref("<@abc>"), None);
    }

    #[test]
    fn mention_round_trips() {
        assert_eq!(parse_user_ref(&mention(7)), Some(7));
    }
}
