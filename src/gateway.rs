//! Outbound side of the messaging gateway.
//!
//! The chat platform itself is out of scope; the bot talks to it through the
//! [`Gateway`] trait. Two implementations ship with the crate: one printing to
//! stdout for replays and one recording everything for tests.

use std::collections::HashSet;
use std::fmt;
use std::io::{self, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::model::{ChannelId, UserId};

/// Handle of a sent message, used to edit it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub channel: ChannelId,
    pub id: u64,
}

/// Structured message, rendered by the platform as a card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub fields: Vec<(String, String)>,
}

impl Embed {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }
}

impl fmt::Display for Embed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.title)?;
        if !self.description.is_empty() {
            write!(f, " {}", self.description.replace('\n', " | "))?;
        }
        for (name, value) in &self.fields {
            write!(f, " | {name}: {}", value.replace('\n', " | "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Embed(Embed),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Text(text) => f.write_str(text),
            Reply::Embed(embed) => write!(f, "{embed}"),
        }
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Reply::Text(text)
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Reply::Text(text.to_string())
    }
}

impl From<Embed> for Reply {
    fn from(embed: Embed) -> Self {
        Reply::Embed(embed)
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("user {0} does not accept direct messages")]
    DeliveryBlocked(UserId),
}

pub trait Gateway: Send + Sync {
    fn send_message(&self, channel: ChannelId, reply: Reply) -> MessageRef;

    fn edit_message(&self, message: MessageRef, content: &str);

    fn send_direct_message(&self, user: UserId, reply: Reply) -> Result<(), DeliveryError>;
}

/// Prints every outbound message to stdout, one line each.
#[derive(Debug, Default)]
pub struct ConsoleGateway {
    next_id: AtomicU64,
}

impl ConsoleGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn print(line: String) {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        // A closed stdout only loses console output.
        let _ = writeln!(out, "{line}");
    }
}

impl Gateway for ConsoleGateway {
    fn send_message(&self, channel: ChannelId, reply: Reply) -> MessageRef {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Self::print(format!("#{channel} {reply}"));
        MessageRef { channel, id }
    }

    fn edit_message(&self, message: MessageRef, content: &str) {
        Self::print(format!(
            "#{} (edit {}) {}",
            message.channel,
            message.id,
            content.replace('\n', " | ")
        ));
    }

    fn send_direct_message(&self, user: UserId, reply: Reply) -> Result<(), DeliveryError> {
        Self::print(format!("@{user} {reply}"));
        Ok(())
    }
}

/// Something the bot sent, as seen by [`RecordingGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Message { message: MessageRef, reply: Reply },
    Edit { message: MessageRef, content: String },
    Direct { user: UserId, reply: Reply },
}

/// Keeps everything sent, in order. Users can be marked as blocking DMs.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    next_id: AtomicU64,
    sent: Mutex<Vec<Outbound>>,
    blocked: Mutex<HashSet<UserId>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block_direct_messages(&self, user: UserId) {
        self.blocked
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(user);
    }

    pub fn sent(&self) -> Vec<Outbound> {
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Rendered channel messages (edits excluded).
    pub fn messages(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|out| match out {
                Outbound::Message { reply, .. } => Some(reply.to_string()),
                _ => None,
            })
            .collect()
    }

    pub fn direct_messages(&self, user: UserId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|out| match out {
                Outbound::Direct { user: to, reply } if to == user => Some(reply.to_string()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, outbound: Outbound) {
        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(outbound);
    }
}

impl Gateway for RecordingGateway {
    fn send_message(&self, channel: ChannelId, reply: Reply) -> MessageRef {
        let message = MessageRef {
            channel,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        self.record(Outbound::Message { message, reply });
        message
    }

    fn edit_message(&self, message: MessageRef, content: &str) {
        self.record(Outbound::Edit {
            message,
            content: content.to_string(),
        });
    }

    fn send_direct_message(&self, user: UserId, reply: Reply) -> Result<(), DeliveryError> {
        let blocked = self
            .blocked
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(&user);
        if blocked {
            return Err(DeliveryError::DeliveryBlocked(user));
        }
        self.record(Outbound::Direct { user, reply });
        Ok(())
    }
}
