//! Once-a-day operations: check-in and begging.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{Field, LedgerDocument, LedgerError};
use crate::Points;
use crate::model::UserId;

pub const CHECKIN_BASE_REWARD: Points = Points::new(50);
const CHECKIN_BONUS: Points = Points::new(77);
const CHECKIN_BONUS_CHANCE: f64 = 0.05;

/// Lifetime check-in count → one-off bonus.
pub const MILESTONES: [(usize, Points); 8] = [
    (5, Points::new(50)),
    (10, Points::new(100)),
    (15, Points::new(150)),
    (20, Points::new(200)),
    (30, Points::new(300)),
    (50, Points::new(500)),
    (75, Points::new(750)),
    (100, Points::new(1_000)),
];

pub const BEG_DAILY_LIMIT: usize = 5;
const BEG_SUCCESS_CHANCE: f64 = 0.85;

/// Calendar date of `at` in the economy's reference timezone.
pub fn civil_day(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckinReceipt {
    pub day: NaiveDate,
    pub streak: u32,
    pub total_checkins: usize,
    pub base: Points,
    pub bonus: Points,
    pub milestone_bonus: Option<Points>,
}

impl CheckinReceipt {
    pub fn total(&self) -> Points {
        self.base + self.bonus + self.milestone_bonus.unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckinStatus {
    pub total_days: usize,
    pub streak: u32,
    /// Next milestone and the days still missing, `None` once all are reached.
    pub next_milestone: Option<(usize, usize)>,
}

/// Begging attempts made on `day`; replaced when the user begs on a later day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BegTally {
    pub day: NaiveDate,
    pub attempts: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BegOutcome {
    Granted(Points),
    Refused,
}

impl LedgerDocument {
    /// Record today's check-in and pay the rewards:
    /// - Reject a second check-in on the same civil day
    /// - Extend the streak when yesterday was checked in, otherwise restart it
    /// - Pay the base reward, the random bonus and any milestone just reached
    pub fn check_in(
        &mut self,
        user: UserId,
        day: NaiveDate,
        rng: &mut impl Rng,
    ) -> Result<CheckinReceipt, LedgerError> {
        let account = self.account_mut(user);
        if account.checkins.contains(&day) {
            return Err(LedgerError::AlreadyCheckedIn(day));
        }

        let continued = day
            .pred_opt()
            .is_some_and(|yesterday| account.checkins.contains(&yesterday));
        account.streak = if continued { account.streak + 1 } else { 1 };
        account.checkins.insert(day);

        let bonus = if rng.gen_bool(CHECKIN_BONUS_CHANCE) {
            CHECKIN_BONUS
        } else {
            Points::ZERO
        };
        let total_checkins = account.checkins.len();
        let milestone_bonus = MILESTONES
            .iter()
            .find(|(days, _)| *days == total_checkins)
            .map(|(_, bonus)| *bonus);

        let receipt = CheckinReceipt {
            day,
            streak: account.streak,
            total_checkins,
            base: CHECKIN_BASE_REWARD,
            bonus,
            milestone_bonus,
        };
        self.credit(user, Field::Points, receipt.total());
        self.credit(user, Field::ActivityXp, receipt.total());
        Ok(receipt)
    }

    pub fn checkin_status(&self, user: UserId) -> CheckinStatus {
        let (total_days, streak) = self
            .account(user)
            .map(|a| (a.checkins.len(), a.streak))
            .unwrap_or_default();
        let next_milestone = MILESTONES
            .iter()
            .find(|(days, _)| total_days < *days)
            .map(|(days, _)| (*days, days - total_days));
        CheckinStatus {
            total_days,
            streak,
            next_milestone,
        }
    }

    /// Ask for spare points, at most [`BEG_DAILY_LIMIT`] times per civil day.
    ///
    /// Every attempt counts toward the limit, successful or not.
    pub fn beg(
        &mut self,
        user: UserId,
        day: NaiveDate,
        rng: &mut impl Rng,
    ) -> Result<BegOutcome, LedgerError> {
        let tally = self
            .begging
            .entry(user)
            .or_insert(BegTally { day, attempts: 0 });
        if tally.day != day {
            *tally = BegTally { day, attempts: 0 };
        }
        if tally.attempts >= BEG_DAILY_LIMIT {
            return Err(LedgerError::BegLimitReached {
                attempts: tally.attempts,
            });
        }
        tally.attempts += 1;

        if rng.gen_bool(BEG_SUCCESS_CHANCE) {
            let gain = Points::new(rng.gen_range(10..=30));
            self.credit(user, Field::Points, gain);
            Ok(BegOutcome::Granted(gain))
        } else {
            Ok(BegOutcome::Refused)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::rngs::mock::StepRng;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    /// `gen_bool` is always false with a zero step.
    fn no_luck() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    #[test]
    fn civil_day_uses_offset() {
        let kst = FixedOffset::east_opt(9 * 3600).unwrap();
        let late_utc = Utc.with_ymd_and_hms(2024, 3, 1, 16, 0, 0).unwrap();
        assert_eq!(civil_day(late_utc, kst), day(2));
        let early_utc = Utc.with_ymd_and_hms(2024, 3, 1, 14, 59, 0).unwrap();
        assert_eq!(civil_day(early_utc, kst), day(1));
    }

    #[test]
    fn check_in_twice_same_day_changes_nothing() {
        let mut doc = LedgerDocument::default();
        let mut rng = no_luck();
        doc.check_in(1, day(1), &mut rng).unwrap();
        let before = doc.clone();

        let result = doc.check_in(1, day(1), &mut rng);
        assert!(matches!(result, Err(LedgerError::AlreadyCheckedIn(d)) if d == day(1)));
        assert_eq!(doc, before);
    }

    #[test]
    fn streak_continues_then_resets_after_gap() {
        let mut doc = LedgerDocument::default();
        let mut rng = no_luck();

        let r1 = doc.check_in(1, day(1), &mut rng).unwrap();
        assert_eq!((r1.streak, r1.total()), (1, Points::new(50)));
        let r2 = doc.check_in(1, day(2), &mut rng).unwrap();
        assert_eq!((r2.streak, r2.total()), (2, Points::new(50)));
        let r4 = doc.check_in(1, day(4), &mut rng).unwrap();
        assert_eq!((r4.streak, r4.total()), (1, Points::new(50)));

        let account = doc.account(1).unwrap();
        assert_eq!(account.streak, 1);
        assert_eq!(account.points, Points::new(150));
        assert_eq!(account.activity_xp, Points::new(150));
    }

    #[test]
    fn milestone_paid_exactly_once() {
        let mut doc = LedgerDocument::default();
        let mut rng = no_luck();
        for d in 1..=4 {
            assert!(doc.check_in(1, day(d), &mut rng).unwrap().milestone_bonus.is_none());
        }
        let fifth = doc.check_in(1, day(5), &mut rng).unwrap();
        assert_eq!(fifth.milestone_bonus, Some(Points::new(50)));
        assert_eq!(fifth.total_checkins, 5);
        let sixth = doc.check_in(1, day(6), &mut rng).unwrap();
        assert!(sixth.milestone_bonus.is_none());

        assert_eq!(doc.balance(1), Points::new(6 * 50 + 50));
    }

    #[test]
    fn checkin_status_reports_next_milestone() {
        let mut doc = LedgerDocument::default();
        let mut rng = no_luck();
        for d in 1..=3 {
            doc.check_in(1, day(d), &mut rng).unwrap();
        }
        let status = doc.checkin_status(1);
        assert_eq!(status.total_days, 3);
        assert_eq!(status.streak, 3);
        assert_eq!(status.next_milestone, Some((5, 2)));

        let fresh = doc.checkin_status(2);
        assert_eq!(fresh.total_days, 0);
        assert_eq!(fresh.next_milestone, Some((5, 5)));
    }

    #[test]
    fn bonus_is_occasional() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut bonuses = 0;
        for user in 0..2_000 {
            let mut doc = LedgerDocument::default();
            if doc.check_in(user, day(1), &mut rng).unwrap().bonus > Points::ZERO {
                bonuses += 1;
            }
        }
        assert!((40..=180).contains(&bonuses), "got {bonuses} bonuses");
    }

    #[test]
    fn beg_limited_per_day() {
        let mut doc = LedgerDocument::default();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..BEG_DAILY_LIMIT {
            doc.beg(1, day(1), &mut rng).unwrap();
        }
        assert!(matches!(
            doc.beg(1, day(1), &mut rng),
            Err(LedgerError::BegLimitReached { attempts: 5 })
        ));
        assert!(doc.beg(1, day(2), &mut rng).is_ok());
        assert_eq!(doc.begging[&1], BegTally { day: day(2), attempts: 1 });
    }

    #[test]
    fn refused_beg_opens_no_account() {
        let mut doc = LedgerDocument::default();
        assert_eq!(doc.beg(6, day(1), &mut no_luck()).unwrap(), BegOutcome::Refused);
        assert!(doc.account(6).is_none());
        assert!(doc.stats().is_none());
        assert!(doc.leaderboard(10).is_empty());
        assert_eq!(doc.begging[&6].attempts, 1);
    }

    #[test]
    fn beg_tally_keeps_only_the_latest_day() {
        let mut doc = LedgerDocument::default();
        let mut rng = no_luck();
        for _ in 0..3 {
            doc.beg(1, day(1), &mut rng).unwrap();
        }
        doc.beg(1, day(3), &mut rng).unwrap();
        assert_eq!(doc.begging.len(), 1);
        assert_eq!(doc.begging[&1], BegTally { day: day(3), attempts: 1 });
    }

    #[test]
    fn beg_grants_between_ten_and_thirty() {
        let mut rng = StdRng::seed_from_u64(5);
        for user in 0..200 {
            let mut doc = LedgerDocument::default();
            if let BegOutcome::Granted(gain) = doc.beg(user, day(1), &mut rng).unwrap() {
                assert!((10..=30).contains(&gain.value()));
                assert_eq!(doc.balance(user), gain);
                assert_eq!(doc.account(user).unwrap().activity_xp, Points::ZERO);
            }
        }
    }
}
