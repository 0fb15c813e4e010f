use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::Points;
use crate::leveling::{self, LevelProgress};

/// Additive balances an account carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Spendable balance.
    Points,
    /// XP earned by voice presence and check-ins.
    ActivityXp,
    /// XP granted by administrators.
    AdminXp,
    /// Lifetime gambling payouts.
    GamblePoints,
    /// Lifetime gambling losses.
    GambleLosses,
}

/// One user's balances and activity logs.
///
/// Every field defaults when missing from a stored document, so older
/// documents keep loading as the schema grows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    pub points: Points,
    pub activity_xp: Points,
    pub admin_xp: Points,
    pub gamble_points: Points,
    pub gamble_losses: Points,
    pub checkins: BTreeSet<NaiveDate>,
    pub streak: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Account {
    pub fn get(&self, field: Field) -> Points {
        match field {
            Field::Points => self.points,
            Field::ActivityXp => self.activity_xp,
            Field::AdminXp => self.admin_xp,
            Field::GamblePoints => self.gamble_points,
            Field::GambleLosses => self.gamble_losses,
        }
    }

    pub(crate) fn add(&mut self, field: Field, amount: Points) {
        let slot = match field {
            Field::Points => &mut self.points,
            Field::ActivityXp => &mut self.activity_xp,
            Field::AdminXp => &mut self.admin_xp,
            Field::GamblePoints => &mut self.gamble_points,
            Field::GambleLosses => &mut self.gamble_losses,
        };
        *slot += amount;
    }

    /// XP counted toward leveling.
    pub fn total_xp(&self) -> Points {
        self.activity_xp + self.admin_xp
    }

    pub fn level(&self) -> LevelProgress {
        leveling::level_of(self.total_xp().value())
    }
}
