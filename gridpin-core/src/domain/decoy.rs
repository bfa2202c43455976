//! Decoy balance - the fabricated figure shown during duress sessions
//!
//! The decoy is never derived from the real ledger. Each withdrawal draws a
//! brand new baseline, so the sequence a coercer sees is neither running nor
//! monotonic. That is intentional: a consistent fake history would be
//! something an attacker could check.

use rand::Rng;

/// Smallest decoy baseline
pub const DECOY_MIN: i64 = 1_000;

/// Number of distinct baselines; draws land in `DECOY_MIN..DECOY_MIN + DECOY_SPAN`
pub const DECOY_SPAN: i64 = 1_501;

pub struct DecoyBalance;

impl DecoyBalance {
    /// Fresh baseline in `[1000, 2500]`
    pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> i64 {
        DECOY_MIN + rng.gen_range(0..DECOY_SPAN)
    }

    /// Figure to show after a duress withdrawal: new baseline minus the amount
    pub fn after_withdrawal<R: Rng + ?Sized>(rng: &mut R, amount: i64) -> i64 {
        Self::draw(rng) - amount
    }
}
