//! Accumulating validation for configuration and genesis input.
//!
//! Built on Stillwater's `Validation` type so that every violation is
//! reported in a single pass instead of stopping at the first one.
//!
//! # Example
//!
//! ```rust
//! use loyalty::tier::TierSpec;
//! use loyalty::validation::{validate_tier_specs, ValidationErrors};
//!
//! let specs = vec![TierSpec::new("", 10, 0), TierSpec::new("Gold", 5, 2)];
//! let errors = ValidationErrors::check(validate_tier_specs(&specs)).unwrap_err();
//! assert_eq!(errors.len(), 3);
//! ```

pub mod rules;
pub mod violations;

pub use rules::{
    validate_config, validate_customer_input, validate_retry_policy, validate_tier_specs,
};
pub use violations::{ValidationError, ValidationErrors};
