//! One d6 each against the house.

use rand::Rng;

use super::GameError;
use crate::Points;
use crate::gateway::Embed;
use crate::ledger::{Field, LedgerDocument};
use crate::model::UserId;

pub const MINIMUM: Points = Points::new(10);
pub const WIN: Points = Points::new(30);
pub const LOSS: Points = Points::new(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceOutcome {
    pub player: u8,
    pub house: u8,
    /// Signed change applied to the player's points.
    pub delta: i64,
    pub balance: Points,
}

pub fn play(
    doc: &mut LedgerDocument,
    user: UserId,
    rng: &mut impl Rng,
) -> Result<DiceOutcome, GameError> {
    if doc.balance(user) < MINIMUM {
        return Err(GameError::DiceMinimum(MINIMUM));
    }
    let player = rng.gen_range(1..=6);
    let house = rng.gen_range(1..=6);
    let delta = match player.cmp(&house) {
        std::cmp::Ordering::Greater => {
            doc.credit(user, Field::Points, WIN);
            WIN.value()
        }
        std::cmp::Ordering::Less => {
            doc.debit(user, LOSS)?;
            -LOSS.value()
        }
        std::cmp::Ordering::Equal => 0,
    };
    Ok(DiceOutcome {
        player,
        house,
        delta,
        balance: doc.balance(user),
    })
}

pub fn embed(outcome: &DiceOutcome) -> Embed {
    let result = match outcome.delta {
        d if d > 0 => format!("🎉 You win! +{d} points"),
        d if d < 0 => format!("😢 You lose... {d} points"),
        _ => "🤝 Draw! No change.".to_string(),
    };
    Embed::new("🎲 Dice duel").description(format!(
        "You: {}  vs  bot: {}\n{result}\nBalance: {}",
        outcome.player, outcome.house, outcome.balance
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Ledger;
    use crate::store::{DocumentStore, MemoryStore, StoreError};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStore {
        inner: MemoryStore<LedgerDocument>,
        saves: Arc<AtomicUsize>,
    }

    impl DocumentStore<LedgerDocument> for CountingStore {
        fn load(&self) -> LedgerDocument {
            self.inner.load()
        }

        fn save(&self, document: &LedgerDocument) -> Result<(), StoreError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.save(document)
        }
    }

    #[test]
    fn requires_minimum_balance() {
        let mut doc = LedgerDocument::default();
        doc.credit(1, Field::Points, Points::new(9));
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            play(&mut doc, 1, &mut rng),
            Err(GameError::DiceMinimum(_))
        ));
        assert_eq!(doc.balance(1), Points::new(9));
    }

    #[test]
    fn delta_follows_rolls() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut seen = [false; 3];
        for _ in 0..300 {
            let mut doc = LedgerDocument::default();
            doc.credit(1, Field::Points, Points::new(10));
            let outcome = play(&mut doc, 1, &mut rng).unwrap();
            assert!((1..=6).contains(&outcome.player));
            assert!((1..=6).contains(&outcome.house));
            let expected: i64 = match outcome.player.cmp(&outcome.house) {
                std::cmp::Ordering::Greater => 30,
                std::cmp::Ordering::Less => -10,
                std::cmp::Ordering::Equal => 0,
            };
            seen[(expected.signum() + 1) as usize] = true;
            assert_eq!(outcome.delta, expected);
            assert_eq!(outcome.balance, Points::new(10 + expected));
        }
        assert_eq!(seen, [true; 3]);
    }

    #[test]
    fn below_minimum_never_writes() {
        let saves = Arc::new(AtomicUsize::new(0));
        let ledger = Ledger::new(CountingStore {
            inner: MemoryStore::default(),
            saves: saves.clone(),
        });
        let mut rng = StdRng::seed_from_u64(4);

        assert!(matches!(
            ledger.transact_with(|doc| play(doc, 1, &mut rng)),
            Err(GameError::DiceMinimum(_))
        ));
        assert_eq!(saves.load(Ordering::SeqCst), 0);

        ledger.credit(1, Field::Points, Points::new(10)).unwrap();
        ledger.transact_with(|doc| play(doc, 1, &mut rng)).unwrap();
        assert_eq!(saves.load(Ordering::SeqCst), 2);
    }
}
