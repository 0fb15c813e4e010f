//! Single-shot gamble against fixed payout bands.

use rand::Rng;

use crate::Points;
use crate::ledger::{Field, LedgerDocument, LedgerError};
use crate::model::UserId;

/// Half-open band `[previous upper, upper)` of the `[0, 100)` roll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub upper: f64,
    /// Payout as a multiple of the bet; zero loses the bet.
    pub multiplier: i64,
}

/// Contiguous, ascending and covering `[0, 100)`.
pub const BANDS: [Band; 4] = [
    Band { upper: 58.5, multiplier: 0 },
    Band { upper: 94.0, multiplier: 2 },
    Band { upper: 99.0, multiplier: 3 },
    Band { upper: 100.0, multiplier: 10 },
];

/// Band containing `roll`; rolls at or past 100 fall into the last band.
pub fn band_for(roll: f64) -> Band {
    BANDS
        .iter()
        .copied()
        .find(|band| roll < band.upper)
        .unwrap_or(BANDS[BANDS.len() - 1])
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GambleOutcome {
    pub roll: f64,
    pub multiplier: i64,
    pub payout: Points,
    pub balance: Points,
}

/// Stake `bet`, roll, and pay out by band:
/// - The bet must be positive and covered by the balance
/// - Losses accumulate in `gamble_losses`, payouts in `gamble_points`
pub fn play(
    doc: &mut LedgerDocument,
    user: UserId,
    bet: Points,
    rng: &mut impl Rng,
) -> Result<GambleOutcome, LedgerError> {
    if !bet.is_positive() {
        return Err(LedgerError::InvalidAmount(bet));
    }
    doc.debit(user, bet)?;

    let roll = rng.gen_range(0.0..100.0);
    let band = band_for(roll);
    let payout = bet.times(band.multiplier);
    if band.multiplier == 0 {
        doc.credit(user, Field::GambleLosses, bet);
    } else {
        doc.credit(user, Field::Points, payout);
        doc.credit(user, Field::GamblePoints, payout);
    }

    Ok(GambleOutcome {
        roll,
        multiplier: band.multiplier,
        payout,
        balance: doc.balance(user),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn bands_are_contiguous_and_exhaustive() {
        let mut lower = 0.0;
        for band in BANDS {
            assert!(band.upper > lower);
            lower = band.upper;
        }
        assert_eq!(lower, 100.0);

        let mut roll = 0.0;
        while roll < 100.0 {
            let containing = BANDS
                .iter()
                .enumerate()
                .filter(|(i, band)| {
                    let low = if *i == 0 { 0.0 } else { BANDS[i - 1].upper };
                    roll >= low && roll < band.upper
                })
                .count();
            assert_eq!(containing, 1, "roll {roll}");
            roll += 0.05;
        }
    }

    #[test]
    fn band_edges() {
        assert_eq!(band_for(0.0).multiplier, 0);
        assert_eq!(band_for(58.49).multiplier, 0);
        assert_eq!(band_for(58.5).multiplier, 2);
        assert_eq!(band_for(93.99).multiplier, 2);
        assert_eq!(band_for(94.0).multiplier, 3);
        assert_eq!(band_for(99.0).multiplier, 10);
        assert_eq!(band_for(99.999).multiplier, 10);
    }

    #[test]
    fn zero_balance_is_rejected() {
        let mut doc = LedgerDocument::default();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            play(&mut doc, 1, Points::new(10), &mut rng),
            Err(LedgerError::InsufficientFunds { user: 1, .. })
        ));
        assert_eq!(doc.balance(1), Points::ZERO);
    }

    #[test]
    fn non_positive_bet_is_rejected() {
        let mut doc = LedgerDocument::default();
        doc.credit(1, Field::Points, Points::new(100));
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            play(&mut doc, 1, Points::ZERO, &mut rng),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert_eq!(doc.balance(1), Points::new(100));
    }

    #[test]
    fn outcomes_settle_consistently() {
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..500 {
            let mut doc = LedgerDocument::default();
            doc.credit(1, Field::Points, Points::new(100));
            let outcome = play(&mut doc, 1, Points::new(10), &mut rng).unwrap();
            let account = doc.account(1).unwrap();

            assert_eq!(outcome.multiplier, band_for(outcome.roll).multiplier);
            assert_eq!(account.points, Points::new(90) + outcome.payout);
            if outcome.multiplier == 0 {
                assert_eq!(account.gamble_losses, Points::new(10));
                assert_eq!(account.gamble_points, Points::ZERO);
            } else {
                assert_eq!(account.gamble_points, outcome.payout);
                assert_eq!(account.gamble_losses, Points::ZERO);
            }
        }
    }
}
