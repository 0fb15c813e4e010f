use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::ledger::LedgerDocument;
use crate::model::{ChannelId, ChatMessage, GatewayEvent, PresenceChange, UserId};

/// Errors that can occur when reading or writing csv files
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open {path}: {source}")]
    Open { path: String, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized event kind '{kind}'")]
    UnrecognizedKind { line: usize, kind: String },

    #[error("line {line}: {kind} event missing {field}")]
    MissingField {
        line: usize,
        kind: String,
        field: &'static str,
    },

    #[error("failed to write accounts: {0}")]
    Write(#[from] csv::Error),

    #[error("failed to write accounts: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Deserialize)]
struct EventRow {
    at: DateTime<Utc>,
    kind: String,
    user: UserId,
    name: Option<String>,
    bot: Option<bool>,
    channel: Option<ChannelId>,
    to_channel: Option<ChannelId>,
    muted: Option<bool>,
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct AccountRow {
    user: UserId,
    points: i64,
    activity_xp: i64,
    admin_xp: i64,
    level: u32,
    streak: u32,
}

/// Read gateway events from a csv file
///
/// `message` rows need `channel` and `content`; `voice` rows use `channel` as
/// the channel left and `to_channel` as the channel joined, either may be
/// empty.
pub fn read_events(
    path: &Path,
) -> Result<impl Iterator<Item = Result<GatewayEvent, CsvError>> + use<>, CsvError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.display().to_string(),
            source,
        })?;

    Ok(reader
        .into_deserialize::<EventRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            let name = row.name.unwrap_or_else(|| row.user.to_string());
            match row.kind.as_str() {
                "message" => {
                    let missing = |field| CsvError::MissingField {
                        line,
                        kind: "message".to_string(),
                        field,
                    };
                    Ok(GatewayEvent::Message(ChatMessage {
                        author: row.user,
                        author_name: name,
                        author_is_bot: row.bot.unwrap_or(false),
                        channel: row.channel.ok_or_else(|| missing("channel"))?,
                        content: row.content.ok_or_else(|| missing("content"))?,
                        at: row.at,
                    }))
                }
                "voice" => Ok(GatewayEvent::VoicePresenceChanged(PresenceChange {
                    user: row.user,
                    display_name: name,
                    previous: row.channel,
                    current: row.to_channel,
                    muted: row.muted.unwrap_or(false),
                    at: row.at,
                })),
                other => Err(CsvError::UnrecognizedKind {
                    line,
                    kind: other.to_string(),
                }),
            }
        }))
}

/// Write every account of the ledger in csv format, ordered by user id
pub fn write_accounts(writer: impl io::Write, doc: &LedgerDocument) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_writer(writer);

    for (user, account) in &doc.accounts {
        let row = AccountRow {
            user: *user,
            points: account.points.value(),
            activity_xp: account.activity_xp.value(),
            admin_xp: account.admin_xp.value(),
            level: account.level().level,
            streak: account.streak,
        };
        writer.serialize(&row)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Points;
    use crate::ledger::Field;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "at,kind,user,name,bot,channel,to_channel,muted,content\n";

    fn write_csv(rows: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(HEADER.as_bytes()).unwrap();
        file.write_all(rows.as_bytes()).unwrap();
        file
    }

    fn read(rows: &str) -> Vec<Result<GatewayEvent, CsvError>> {
        let file = write_csv(rows);
        read_events(file.path()).unwrap().collect()
    }

    #[test]
    fn read_message() {
        let results = read("2024-03-01T03:00:00Z,message,1,alice,,10,,,!checkin\n");
        assert_eq!(results.len(), 1);

        match results.into_iter().next().unwrap().unwrap() {
            GatewayEvent::Message(msg) => {
                assert_eq!(msg.author, 1);
                assert_eq!(msg.author_name, "alice");
                assert!(!msg.author_is_bot);
                assert_eq!(msg.channel, 10);
                assert_eq!(msg.content, "!checkin");
            }
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[test]
    fn read_voice_with_whitespace() {
        let results = read("2024-03-01T03:00:00Z, voice, 2, bob, , , 7, true,\n");
        match results.into_iter().next().unwrap().unwrap() {
            GatewayEvent::VoicePresenceChanged(change) => {
                assert_eq!(change.user, 2);
                assert_eq!(change.previous, None);
                assert_eq!(change.current, Some(7));
                assert!(change.muted);
            }
            other => panic!("expected voice change, got {other:?}"),
        }
    }

    #[test]
    fn quoted_content_keeps_commas() {
        let results = read(
            "2024-03-01T03:00:00Z,message,1,alice,,10,,,\"!market register (Logo, big) 30\"\n",
        );
        match results.into_iter().next().unwrap().unwrap() {
            GatewayEvent::Message(msg) => {
                assert_eq!(msg.content, "!market register (Logo, big) 30")
            }
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[test]
    fn read_returns_error_for_unknown_kind() {
        let results = read("2024-03-01T03:00:00Z,reaction,1,alice,,10,,,\n");
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, CsvError::UnrecognizedKind { line: 2, .. }));
    }

    #[test]
    fn read_returns_error_for_missing_content() {
        let results = read(
            "2024-03-01T03:00:00Z,message,1,alice,,10,,,\n\
             2024-03-01T03:00:00Z,message,1,alice,,10,,,hi\n",
        );
        assert_eq!(results.len(), 2);
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(
            err,
            CsvError::MissingField {
                line: 2,
                field: "content",
                ..
            }
        ));
        assert!(results[1].is_ok());
    }

    #[test]
    fn events_outlive_the_path() {
        let file = write_csv("2024-03-01T03:00:00Z,message,1,alice,,10,,,hi\n");
        let events = {
            let path = file.path().to_path_buf();
            read_events(&path).unwrap()
        };
        let handle = std::thread::spawn(move || events.count());
        assert_eq!(handle.join().unwrap(), 1);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(matches!(
            read_events(Path::new("/nonexistent/events.csv")),
            Err(CsvError::Open { .. })
        ));
    }

    #[test]
    fn writes_accounts_in_user_order() {
        let mut doc = LedgerDocument::default();
        doc.credit(2, Field::Points, Points::new(1_500));
        doc.credit(2, Field::ActivityXp, Points::new(120));
        doc.credit(1, Field::AdminXp, Points::new(5));

        let mut out = Vec::new();
        write_accounts(&mut out, &doc).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "user,points,activity_xp,admin_xp,level,streak");
        assert_eq!(lines[1], "1,0,0,5,1,0");
        assert_eq!(lines[2], "2,1500,120,0,2,0");
    }
}
