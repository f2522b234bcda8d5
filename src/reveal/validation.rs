//! Reveal validation
//!
//! Local checks run before a reveal is sent anywhere. Every check runs and
//! every failure is reported, in a fixed order:
//!   1. deadline not expired
//!   2. amount in strictly positive
//!   3. minimum out non-negative
//!   4. user, tokenIn, tokenOut and recipient non-zero
//!   5. recomputed commitment hash equals the stored one (skipped for
//!      records verified by a proof system)

use chrono::{DateTime, Utc};
use ethers::types::H256;
use std::fmt;

use crate::domain::RevealRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealViolation {
    DeadlineExpired { deadline: u64, now: u64 },
    NonPositiveAmount { amount_in: i128 },
    NegativeMinOut { min_amount_out: i128 },
    ZeroAddress { field: String },
    HashMismatch { expected: H256, computed: H256 },
}

impl fmt::Display for RevealViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeadlineExpired { deadline, now } => {
                write!(f, "deadline {} expired (now {})", deadline, now)
            }
            Self::NonPositiveAmount { amount_in } => {
                write!(f, "amountIn must be positive, got {}", amount_in)
            }
            Self::NegativeMinOut { min_amount_out } => {
                write!(f, "minAmountOut must not be negative, got {}", min_amount_out)
            }
            Self::ZeroAddress { field } => write!(f, "{} is the zero address", field),
            Self::HashMismatch { expected, computed } => write!(
                f,
                "commitment hash mismatch: stored {:?}, intent hashes to {:?}",
                expected, computed
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<RevealViolation>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<RevealViolation>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// Violations joined into one line for logs and submission outcomes
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validate a reveal against the current wall clock.
pub fn validate_reveal(record: &RevealRecord) -> ValidationReport {
    validate_reveal_at(record, Utc::now())
}

/// Validate a reveal as of `now`.
pub fn validate_reveal_at(record: &RevealRecord, now: DateTime<Utc>) -> ValidationReport {
    let intent = &record.intent;
    let now_secs = now.timestamp().max(0) as u64;
    let mut errors = Vec::new();

    if intent.deadline <= now_secs {
        errors.push(RevealViolation::DeadlineExpired {
            deadline: intent.deadline,
            now: now_secs,
        });
    }

    if intent.amount_in <= 0 {
        errors.push(RevealViolation::NonPositiveAmount {
            amount_in: intent.amount_in,
        });
    }

    if intent.min_amount_out < 0 {
        errors.push(RevealViolation::NegativeMinOut {
            min_amount_out: intent.min_amount_out,
        });
    }

    for (field, address) in intent.address_fields() {
        if address.is_zero() {
            errors.push(RevealViolation::ZeroAddress {
                field: field.to_string(),
            });
        }
    }

    if !record.proof_required {
        let computed = intent.commitment_hash();
        if computed != record.commitment_hash {
            errors.push(RevealViolation::HashMismatch {
                expected: record.commitment_hash,
                computed,
            });
        }
    }

    ValidationReport::from_errors(errors)
}
