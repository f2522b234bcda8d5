//! Reveal storage, validation and sequential submission

pub mod store;
pub mod validation;

pub use store::{RevealOutcome, RevealStore, RevealSubmission};
pub use validation::{validate_reveal, validate_reveal_at, RevealViolation, ValidationReport};
