//! Guess a number between 1 and 10.

use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use super::{Inbox, Services};
use crate::Points;
use crate::ledger::Field;
use crate::model::{ChannelId, UserId};

pub const RANGE: std::ops::RangeInclusive<u32> = 1..=10;
pub const REWARD: Points = Points::new(50);
const WINDOW: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessOutcome {
    Correct,
    Wrong(u32),
    NotANumber,
    TimedOut,
}

/// Wait for the player's next message in `channel` and judge it against
/// `target`.
pub async fn run(
    services: Services,
    mut inbox: Inbox,
    channel: ChannelId,
    user: UserId,
    target: u32,
) -> GuessOutcome {
    services.say(
        channel,
        "🎲 Guess a number from 1 to 10! You have 10 seconds.",
    );
    let deadline = Instant::now() + WINDOW;
    let answer = inbox
        .next_matching(deadline, |msg| msg.author == user && msg.channel == channel)
        .await;

    let outcome = match answer {
        None => GuessOutcome::TimedOut,
        Some(msg) => match msg.text().parse::<u32>() {
            Ok(guess) if guess == target => GuessOutcome::Correct,
            Ok(guess) => GuessOutcome::Wrong(guess),
            Err(_) => GuessOutcome::NotANumber,
        },
    };

    let reply = match outcome {
        GuessOutcome::Correct => {
            if let Err(err) = services.ledger.credit(user, Field::Points, REWARD) {
                warn!(user, reason = %err, "guess reward not credited");
                return outcome;
            }
            format!("🎉 Correct! The number was {target}. You earn {REWARD} points!")
        }
        GuessOutcome::Wrong(_) => format!("❌ Wrong! The number was {target}."),
        GuessOutcome::NotANumber => "❗ Please answer with a number only.".to_string(),
        GuessOutcome::TimedOut => format!("⌛ Time is up! The number was {target}."),
    };
    services.say(channel, reply);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::RecordingGateway;
    use crate::ledger::Ledger;
    use crate::model::ChatMessage;
    use chrono::Utc;
    use std::sync::Arc;
    use tokio::sync::broadcast;

    fn msg(author: UserId, channel: ChannelId, content: &str) -> ChatMessage {
        ChatMessage {
            author,
            author_name: format!("user{author}"),
            author_is_bot: false,
            channel,
            content: content.to_string(),
            at: Utc::now(),
        }
    }

    fn setup() -> (Services, Arc<RecordingGateway>, broadcast::Sender<ChatMessage>, Inbox) {
        let gateway = Arc::new(RecordingGateway::new());
        let services = Services::new(Arc::new(Ledger::in_memory()), gateway.clone());
        let (tx, rx) = broadcast::channel(16);
        (services, gateway, tx, Inbox::new(rx))
    }

    #[tokio::test(start_paused = true)]
    async fn correct_guess_pays_reward() {
        let (services, gateway, tx, inbox) = setup();
        tx.send(msg(2, 5, "7")).unwrap();
        tx.send(msg(1, 6, "7")).unwrap();
        tx.send(msg(1, 5, " 7 ")).unwrap();

        let outcome = run(services.clone(), inbox, 5, 1, 7).await;
        assert_eq!(outcome, GuessOutcome::Correct);
        assert_eq!(services.ledger.balance(1), REWARD);
        assert!(gateway.messages()[1].contains("Correct"));
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_and_malformed_answers() {
        let (services, _gateway, tx, inbox) = setup();
        tx.send(msg(1, 5, "3")).unwrap();
        assert_eq!(run(services.clone(), inbox, 5, 1, 7).await, GuessOutcome::Wrong(3));

        let inbox = Inbox::new(tx.subscribe());
        tx.send(msg(1, 5, "seven")).unwrap();
        assert_eq!(run(services.clone(), inbox, 5, 1, 7).await, GuessOutcome::NotANumber);
        assert_eq!(services.ledger.balance(1), Points::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn silence_times_out() {
        let (services, gateway, _tx, inbox) = setup();
        assert_eq!(run(services, inbox, 5, 1, 7).await, GuessOutcome::TimedOut);
        assert!(gateway.messages()[1].contains("Time is up"));
    }
}
