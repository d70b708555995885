//! Split computation for expenses.
//!
//! Only equal division is implemented. `Percentage` and `Custom` are accepted
//! on expenses but divided equally as well; the result records that fallback
//! so it is visible to callers instead of silently pretending otherwise.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SplitMethod {
    #[default]
    Equally,
    Percentage,
    Custom,
}

impl SplitMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitMethod::Equally => "Equally",
            SplitMethod::Percentage => "Percentage",
            SplitMethod::Custom => "Custom",
        }
    }
}

impl std::fmt::Display for SplitMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SplitMethod {
    type Err = SplitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Equally" => Ok(SplitMethod::Equally),
            "Percentage" => Ok(SplitMethod::Percentage),
            "Custom" => Ok(SplitMethod::Custom),
            other => Err(SplitError::UnknownMethod(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitLine {
    pub user: Uuid,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitComputation {
    pub lines: Vec<SplitLine>,
    /// Set when the requested method is not implemented and equal division
    /// was applied instead.
    pub fallback_from: Option<SplitMethod>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SplitError {
    #[error("the group has no active participants to split between")]
    NoParticipants,
    #[error("amount must be a positive number")]
    InvalidAmount,
    #[error("unknown split method: {0}")]
    UnknownMethod(String),
}

/// Divides `amount` across `participants`.
///
/// Every participant receives `amount / n`. No cent rounding and no
/// remainder correction is applied, so the sum of the lines equals `amount`
/// only within floating-point tolerance.
pub fn compute_splits(
    amount: f64,
    participants: &[Uuid],
    method: SplitMethod,
) -> Result<SplitComputation, SplitError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(SplitError::InvalidAmount);
    }
    if participants.is_empty() {
        return Err(SplitError::NoParticipants);
    }

    let share = amount / participants.len() as f64;
    let lines = participants
        .iter()
        .map(|&user| SplitLine {
            user,
            amount: share,
        })
        .collect();

    let fallback_from = match method {
        SplitMethod::Equally => None,
        other => Some(other),
    };

    Ok(SplitComputation {
        lines,
        fallback_from,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn users(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn splits_ninety_three_ways() {
        let participants = users(3);
        let result = compute_splits(90.0, &participants, SplitMethod::Equally).unwrap();

        assert_eq!(result.fallback_from, None);
        assert_eq!(result.lines.len(), 3);
        for (line, user) in result.lines.iter().zip(&participants) {
            assert_eq!(line.user, *user);
            assert_abs_diff_eq!(line.amount, 30.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn sum_matches_amount_within_tolerance() {
        for n in 1..=13 {
            for amount in [0.01, 1.0, 10.0, 100.0, 33.33, 1234.56, 99999.99] {
                let result = compute_splits(amount, &users(n), SplitMethod::Equally).unwrap();
                let sum: f64 = result.lines.iter().map(|l| l.amount).sum();
                assert_eq!(result.lines.len(), n);
                assert_abs_diff_eq!(sum, amount, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn no_remainder_correction_is_applied() {
        let result = compute_splits(100.0, &users(3), SplitMethod::Equally).unwrap();
        let first = result.lines[0].amount;
        assert!(result.lines.iter().all(|l| l.amount == first));
    }

    #[test]
    fn unimplemented_methods_fall_back_to_equal_division() {
        let participants = users(4);
        for method in [SplitMethod::Percentage, SplitMethod::Custom] {
            let result = compute_splits(40.0, &participants, method).unwrap();
            assert_eq!(result.fallback_from, Some(method));
            assert!(result.lines.iter().all(|l| l.amount == 10.0));
        }
    }

    #[test]
    fn rejects_empty_participants_and_bad_amounts() {
        assert_eq!(
            compute_splits(10.0, &[], SplitMethod::Equally),
            Err(SplitError::NoParticipants)
        );
        assert_eq!(
            compute_splits(0.0, &users(2), SplitMethod::Equally),
            Err(SplitError::InvalidAmount)
        );
        assert_eq!(
            compute_splits(f64::NAN, &users(2), SplitMethod::Equally),
            Err(SplitError::InvalidAmount)
        );
    }

    #[test]
    fn parses_method_names() {
        assert_eq!("Custom".parse::<SplitMethod>(), Ok(SplitMethod::Custom));
        assert!("Shares".parse::<SplitMethod>().is_err());
        assert_eq!(SplitMethod::Percentage.to_string(), "Percentage");
    }
}
