//! Level and rank derived from cumulative XP.
//!
//! Level `L` needs `xp_for_next(L) = 100 + 20L` XP to advance, so reaching
//! level `L` from level 1 costs `(L - 1)(100 + 10L)` XP in total.

/// XP needed to advance from `level` to `level + 1`.
pub fn xp_for_next(level: u32) -> i64 {
    100 + i64::from(level) * 20
}

/// Total XP consumed to reach `level` from level 1.
fn xp_to_reach(level: u32) -> i128 {
    let l = i128::from(level);
    (l - 1) * (100 + 10 * l)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelProgress {
    pub level: u32,
    /// XP earned inside the current level.
    pub consumed: i64,
    /// XP still missing to reach the next level.
    pub remaining: i64,
}

impl LevelProgress {
    /// Filled segments of a 10-segment progress bar.
    pub fn segments(&self) -> u32 {
        ((self.consumed * 10) / xp_for_next(self.level)) as u32
    }

    pub fn bar(&self) -> String {
        let filled = self.segments() as usize;
        format!("{}{}", "#".repeat(filled), "-".repeat(10 - filled))
    }

    pub fn rank_name(&self) -> &'static str {
        rank_name(self.level)
    }
}

/// Level reached with `xp` total XP. Negative XP counts as zero.
pub fn level_of(xp: i64) -> LevelProgress {
    let xp = i128::from(xp.max(0));

    // 10L² + 90L - (100 + xp) <= 0, solved for L then corrected for float error.
    let disc = 8_100.0 + 40.0 * (100.0 + xp as f64);
    let mut level = (((disc.sqrt() - 90.0) / 20.0).floor() as u32).max(1);
    while level > 1 && xp_to_reach(level) > xp {
        level -= 1;
    }
    while xp_to_reach(level + 1) <= xp {
        level += 1;
    }

    let consumed = (xp - xp_to_reach(level)) as i64;
    LevelProgress {
        level,
        consumed,
        remaining: xp_for_next(level) - consumed,
    }
}

const RANKS: [(u32, &str); 10] = [
    (100, "Challenger"),
    (99, "GrandMaster"),
    (89, "Master"),
    (79, "Diamond"),
    (69, "Emerald"),
    (59, "Platinum"),
    (49, "Gold"),
    (39, "Silver"),
    (29, "Bronze"),
    (19, "Iron"),
];

pub fn rank_name(level: u32) -> &'static str {
    RANKS
        .iter()
        .find(|(min, _)| level >= *min)
        .map(|(_, name)| *name)
        .unwrap_or("Unranked")
}
