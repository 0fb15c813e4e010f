//! Point ledger.
//!
//! The ledger document holds every account plus the slot machine's jackpot
//! accumulator. [`Ledger`] wraps a [`DocumentStore`] and runs each mutation as
//! one load → mutate → save unit under a process-wide lock, so a check made
//! inside [`Ledger::transact`] still holds when the mutation is applied.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Points;
use crate::model::UserId;
use crate::store::{DocumentStore, MemoryStore};

mod account;
pub use account::{Account, Field};

mod daily;
pub use daily::{
    BEG_DAILY_LIMIT, BegOutcome, BegTally, CHECKIN_BASE_REWARD, CheckinReceipt, CheckinStatus,
    MILESTONES, civil_day,
};

mod error;
pub use error::LedgerError;

/// Everything the economy persists, written back whole after every command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerDocument {
    pub accounts: BTreeMap<UserId, Account>,
    /// Fees paid into the slot machine since the last jackpot.
    pub slot_accumulator: Points,
    /// Begging attempts on each user's most recent begging day. Kept apart
    /// from accounts so a refused beg opens no account.
    pub begging: BTreeMap<UserId, BegTally>,
}

/// Aggregate view over all balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub accounts: usize,
    pub total: Points,
    pub average: Points,
}

/// Read access
impl LedgerDocument {
    pub fn account(&self, user: UserId) -> Option<&Account> {
        self.accounts.get(&user)
    }

    /// Spendable points, zero for unseen users.
    pub fn balance(&self, user: UserId) -> Points {
        self.accounts
            .get(&user)
            .map(|a| a.points)
            .unwrap_or_default()
    }

    /// Accounts ordered by points, highest first.
    ///
    /// The sort is stable over ascending user id, which is the tie-break.
    pub fn standings(&self) -> Vec<(UserId, Points)> {
        let mut standings: Vec<_> = self
            .accounts
            .iter()
            .map(|(user, account)| (*user, account.points))
            .collect();
        standings.sort_by(|a, b| b.1.cmp(&a.1));
        standings
    }

    /// 1-based position of `user` in [`standings`](Self::standings).
    pub fn rank(&self, user: UserId) -> Option<usize> {
        self.standings()
            .iter()
            .position(|(u, _)| *u == user)
            .map(|idx| idx + 1)
    }

    pub fn leaderboard(&self, limit: usize) -> Vec<(UserId, Points)> {
        let mut standings = self.standings();
        standings.truncate(limit);
        standings
    }

    pub fn stats(&self) -> Option<Stats> {
        let accounts = self.accounts.len();
        if accounts == 0 {
            return None;
        }
        let total: Points = self.accounts.values().map(|a| a.points).sum();
        Some(Stats {
            accounts,
            total,
            average: Points::new(total.value() / accounts as i64),
        })
    }
}

/// Mutations
impl LedgerDocument {
    /// Account for `user`, created with defaults on first touch.
    pub fn account_mut(&mut self, user: UserId) -> &mut Account {
        self.accounts.entry(user).or_default()
    }

    /// Add `amount` to one of the user's balances. No upper bound.
    pub fn credit(&mut self, user: UserId, field: Field, amount: Points) {
        self.account_mut(user).add(field, amount);
    }

    /// Fail unless `user` can afford `amount`.
    pub fn ensure_funds(&self, user: UserId, amount: Points) -> Result<(), LedgerError> {
        let available = self.balance(user);
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                user,
                available,
                requested: amount,
            });
        }
        Ok(())
    }

    /// Subtract `amount` from the user's points:
    /// - Reject negative amounts
    /// - Reject when the balance does not cover the amount
    pub fn debit(&mut self, user: UserId, amount: Points) -> Result<(), LedgerError> {
        if amount < Points::ZERO {
            return Err(LedgerError::InvalidAmount(amount));
        }
        self.ensure_funds(user, amount)?;
        self.account_mut(user).points -= amount;
        Ok(())
    }

    /// Move points between users:
    /// - Amount must be positive
    /// - Sender and receiver must differ
    /// - Sender must afford the amount
    pub fn transfer(
        &mut self,
        from: UserId,
        to: UserId,
        amount: Points,
    ) -> Result<(), LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(amount));
        }
        if from == to {
            return Err(LedgerError::SelfTransfer(from));
        }
        self.debit(from, amount)?;
        self.credit(to, Field::Points, amount);
        Ok(())
    }

    /// Debit `amount` once from every distinct user, or from nobody if any of
    /// them is short.
    pub fn debit_all(&mut self, users: &[UserId], amount: Points) -> Result<(), LedgerError> {
        if amount < Points::ZERO {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let mut distinct = users.to_vec();
        distinct.sort_unstable();
        distinct.dedup();

        for user in &distinct {
            self.ensure_funds(*user, amount)?;
        }
        for user in distinct {
            self.account_mut(user).points -= amount;
        }
        Ok(())
    }
}

/// Shared handle over the ledger store.
pub struct Ledger {
    store: Mutex<Box<dyn DocumentStore<LedgerDocument>>>,
}

impl Ledger {
    pub fn new(store: impl DocumentStore<LedgerDocument> + 'static) -> Self {
        Self {
            store: Mutex::new(Box::new(store)),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::<LedgerDocument>::default())
    }

    /// Current document, read without taking part in a mutation.
    pub fn snapshot(&self) -> LedgerDocument {
        self.lock().load()
    }

    /// Run `f` as one load → mutate → save unit.
    ///
    /// The document is saved only when `f` succeeds, so a failed validation
    /// leaves the store untouched.
    pub fn transact<T>(
        &self,
        f: impl FnOnce(&mut LedgerDocument) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        self.transact_with(f)
    }

    /// [`transact`](Self::transact) for callers with their own error type.
    pub fn transact_with<T, E: From<LedgerError>>(
        &self,
        f: impl FnOnce(&mut LedgerDocument) -> Result<T, E>,
    ) -> Result<T, E> {
        let store = self.lock();
        let mut document = store.load();
        let value = f(&mut document)?;
        store.save(&document).map_err(LedgerError::from)?;
        debug!(accounts = document.accounts.len(), "ledger saved");
        Ok(value)
    }

    pub fn credit(&self, user: UserId, field: Field, amount: Points) -> Result<(), LedgerError> {
        self.transact(|doc| {
            doc.credit(user, field, amount);
            Ok(())
        })
    }

    pub fn debit(&self, user: UserId, amount: Points) -> Result<(), LedgerError> {
        self.transact(|doc| doc.debit(user, amount))
    }

    pub fn transfer(&self, from: UserId, to: UserId, amount: Points) -> Result<(), LedgerError> {
        self.transact(|doc| doc.transfer(from, to, amount))
    }

    pub fn balance(&self, user: UserId) -> Points {
        self.snapshot().balance(user)
    }

    pub fn rank(&self, user: UserId) -> Option<usize> {
        self.snapshot().rank(user)
    }

    /// Replace the whole document with an empty one.
    pub fn reset(&self) -> Result<(), LedgerError> {
        self.transact(|doc| {
            *doc = LedgerDocument::default();
            Ok(())
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Box<dyn DocumentStore<LedgerDocument>>> {
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonFileStore;
    use tempfile::TempDir;

    fn pts(value: i64) -> Points {
        Points::new(value)
    }

    fn funded(balances: &[(UserId, i64)]) -> LedgerDocument {
        let mut doc = LedgerDocument::default();
        for (user, amount) in balances {
            doc.credit(*user, Field::Points, pts(*amount));
        }
        doc
    }

    // Credit / debit

    #[test]
    fn credit_creates_account() {
        let mut doc = LedgerDocument::default();
        doc.credit(1, Field::ActivityXp, pts(30));

        let account = doc.account(1).unwrap();
        assert_eq!(account.activity_xp, pts(30));
        assert_eq!(account.points, Points::ZERO);
    }

    #[test]
    fn debit_exact_balance_succeeds() {
        let mut doc = funded(&[(1, 100)]);
        doc.debit(1, pts(100)).unwrap();
        assert_eq!(doc.balance(1), Points::ZERO);
    }

    #[test]
    fn debit_insufficient_funds_fails_and_leaves_balance() {
        let mut doc = funded(&[(1, 100)]);
        let result = doc.debit(1, pts(101));
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientFunds { user: 1, .. })
        ));
        assert_eq!(doc.balance(1), pts(100));
    }

    #[test]
    fn debit_unknown_user_is_zero_balance() {
        let mut doc = LedgerDocument::default();
        assert!(matches!(
            doc.debit(9, pts(1)),
            Err(LedgerError::InsufficientFunds { user: 9, .. })
        ));
    }

    #[test]
    fn debit_negative_amount_is_rejected() {
        let mut doc = funded(&[(1, 100)]);
        assert!(matches!(
            doc.debit(1, pts(-5)),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert_eq!(doc.balance(1), pts(100));
    }

    // Transfer

    #[test]
    fn transfer_conserves_points() {
        let mut doc = funded(&[(1, 100), (2, 20)]);
        doc.transfer(1, 2, pts(40)).unwrap();
        assert_eq!(doc.balance(1), pts(60));
        assert_eq!(doc.balance(2), pts(60));
    }

    #[test]
    fn transfer_failures_leave_both_balances() {
        let mut doc = funded(&[(1, 100), (2, 20)]);

        assert!(matches!(
            doc.transfer(1, 2, Points::ZERO),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            doc.transfer(1, 1, pts(10)),
            Err(LedgerError::SelfTransfer(1))
        ));
        assert!(matches!(
            doc.transfer(2, 1, pts(21)),
            Err(LedgerError::InsufficientFunds { user: 2, .. })
        ));

        assert_eq!(doc.balance(1), pts(100));
        assert_eq!(doc.balance(2), pts(20));
    }

    #[test]
    fn debit_all_is_all_or_nothing() {
        let mut doc = funded(&[(1, 100), (2, 5), (3, 100)]);
        let result = doc.debit_all(&[1, 2, 3], pts(10));
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientFunds { user: 2, .. })
        ));
        assert_eq!(doc.balance(1), pts(100));
        assert_eq!(doc.balance(3), pts(100));

        doc.debit_all(&[1, 3], pts(10)).unwrap();
        assert_eq!(doc.balance(1), pts(90));
        assert_eq!(doc.balance(3), pts(90));
    }

    #[test]
    fn debit_all_charges_repeated_user_once() {
        let mut doc = funded(&[(1, 15)]);
        doc.debit_all(&[1, 1], pts(10)).unwrap();
        assert_eq!(doc.balance(1), pts(5));
    }

    // Ranking

    #[test]
    fn rank_orders_by_points_descending() {
        let doc = funded(&[(1, 50), (2, 300), (3, 120)]);
        assert_eq!(doc.rank(2), Some(1));
        assert_eq!(doc.rank(3), Some(2));
        assert_eq!(doc.rank(1), Some(3));
        assert_eq!(doc.rank(42), None);
    }

    #[test]
    fn rank_ties_follow_user_id() {
        let doc = funded(&[(7, 100), (3, 100), (5, 100)]);
        assert_eq!(doc.rank(3), Some(1));
        assert_eq!(doc.rank(5), Some(2));
        assert_eq!(doc.rank(7), Some(3));
    }

    #[test]
    fn leaderboard_truncates() {
        let balances: Vec<_> = (1..=15).map(|u| (u, u as i64 * 10)).collect();
        let doc = funded(&balances);
        let top = doc.leaderboard(10);
        assert_eq!(top.len(), 10);
        assert_eq!(top[0], (15, pts(150)));
        assert_eq!(top[9], (6, pts(60)));
    }

    #[test]
    fn stats_average_is_floored() {
        let doc = funded(&[(1, 10), (2, 11)]);
        let stats = doc.stats().unwrap();
        assert_eq!(stats.accounts, 2);
        assert_eq!(stats.total, pts(21));
        assert_eq!(stats.average, pts(10));
        assert!(LedgerDocument::default().stats().is_none());
    }

    // Ledger handle

    #[test]
    fn transact_saves_only_on_success() {
        let ledger = Ledger::in_memory();
        ledger.credit(1, Field::Points, pts(50)).unwrap();

        let result = ledger.transact(|doc| {
            doc.credit(1, Field::Points, pts(1_000));
            doc.debit(2, pts(1))
        });
        assert!(result.is_err());
        assert_eq!(ledger.balance(1), pts(50));
    }

    #[test]
    fn ledger_persists_through_json_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        {
            let ledger = Ledger::new(JsonFileStore::new(&path));
            ledger.credit(1, Field::Points, pts(70)).unwrap();
            ledger.transfer(1, 2, pts(20)).unwrap();
        }

        let reopened = Ledger::new(JsonFileStore::<LedgerDocument>::new(&path));
        assert_eq!(reopened.balance(1), pts(50));
        assert_eq!(reopened.balance(2), pts(20));
    }

    #[test]
    fn reset_clears_everything() {
        let ledger = Ledger::in_memory();
        ledger.credit(1, Field::Points, pts(50)).unwrap();
        ledger
            .transact(|doc| {
                doc.slot_accumulator = pts(30);
                Ok(())
            })
            .unwrap();

        ledger.reset().unwrap();
        assert_eq!(ledger.snapshot(), LedgerDocument::default());
    }

    #[test]
    fn points_never_go_negative_over_random_operations() {
        use rand::{Rng, SeedableRng, rngs::StdRng};

        let mut rng = StdRng::seed_from_u64(7);
        let mut doc = funded(&[(1, 100), (2, 100), (3, 100)]);
        for _ in 0..2_000 {
            let a = rng.gen_range(1..=3);
            let b = rng.gen_range(1..=3);
            let amount = pts(rng.gen_range(-20..200));
            let _ = match rng.gen_range(0..3) {
                0 => doc.debit(a, amount),
                1 => doc.transfer(a, b, amount),
                _ => doc.debit_all(&[a, b], amount),
            };
            assert!(doc.accounts.values().all(|acc| acc.points >= Points::ZERO));
        }
    }
}
