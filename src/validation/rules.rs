//! Validation rules. Each returns a `Validation` carrying ALL violations.

use crate::config::LoyaltyConfig;
use crate::customer::CustomerInput;
use crate::notify::RetryPolicy;
use crate::tier::{TierSpec, TierTable};
use crate::validation::violations::ValidationError;
use std::collections::HashSet;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Checked = Validation<(), NonEmptyVec<ValidationError>>;

fn check(ok: bool, error: impl FnOnce() -> ValidationError) -> Checked {
    if ok {
        Validation::success(())
    } else {
        Validation::fail(error())
    }
}

fn accumulate(checks: Vec<Checked>) -> Checked {
    Validation::all_vec(checks).map(|_| ())
}

/// Tier table rules: non-empty, lowest tier at 0 points, strictly ascending
/// thresholds, non-empty unique names.
pub fn validate_tier_specs(specs: &[TierSpec]) -> Checked {
    let Some(first) = specs.first() else {
        return Validation::fail(ValidationError::EmptyTierTable);
    };

    let mut checks = vec![check(first.minimum_points == 0, || {
        ValidationError::LowestTierNotZero {
            minimum_points: first.minimum_points,
        }
    })];

    let mut seen = HashSet::new();
    for (ordinal, spec) in specs.iter().enumerate() {
        checks.push(check(!spec.name.trim().is_empty(), || {
            ValidationError::EmptyTierName { ordinal }
        }));

        if !spec.name.is_empty() && !seen.insert(spec.name.as_str()) {
            checks.push(Validation::fail(ValidationError::DuplicateTierName {
                name: spec.name.clone(),
            }));
        }
    }

    for pair in specs.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        checks.push(check(current.minimum_points > previous.minimum_points, || {
            ValidationError::ThresholdsNotAscending {
                name: current.name.clone(),
                minimum_points: current.minimum_points,
                previous: previous.minimum_points,
            }
        }));
    }

    accumulate(checks)
}

/// Genesis input rules: non-empty id, non-negative points, known tier.
pub fn validate_customer_input(input: &CustomerInput, tiers: &TierTable) -> Checked {
    let mut checks = vec![
        check(!input.id.trim().is_empty(), || {
            ValidationError::EmptyCustomerId
        }),
        check(input.points >= 0, || ValidationError::NegativePoints {
            points: input.points,
        }),
    ];

    if let Some(tier) = input.tier {
        checks.push(check(tier.0 < tiers.len(), || ValidationError::UnknownTier {
            ordinal: tier.0,
            len: tiers.len(),
        }));
    }

    accumulate(checks)
}

pub fn validate_retry_policy(policy: &RetryPolicy) -> Checked {
    accumulate(vec![
        check(policy.max_attempts > 0, || ValidationError::NoRetryAttempts),
        check(policy.backoff_coefficient >= 1.0, || {
            ValidationError::BackoffCoefficientTooSmall {
                coefficient: policy.backoff_coefficient,
            }
        }),
        check(policy.max_interval >= policy.initial_interval, || {
            ValidationError::MaxIntervalBelowInitial {
                initial: policy.initial_interval,
                max: policy.max_interval,
            }
        }),
    ])
}

/// Whole-configuration rules.
pub fn validate_config(config: &LoyaltyConfig) -> Checked {
    accumulate(vec![
        validate_tier_specs(&config.tiers),
        check(config.history_threshold > 0, || {
            ValidationError::ZeroHistoryThreshold
        }),
        validate_retry_policy(&config.notification_retry),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::TierRef;
    use crate::validation::ValidationErrors;
    use std::time::Duration;

    fn errors(validation: Checked) -> Vec<ValidationError> {
        ValidationErrors::check(validation)
            .map(|_| Vec::new())
            .unwrap_or_else(ValidationErrors::into_vec)
    }

    #[test]
    fn standard_tiers_pass() {
        assert!(errors(validate_tier_specs(&TierSpec::standard())).is_empty());
    }

    #[test]
    fn empty_table_fails_alone() {
        assert_eq!(
            errors(validate_tier_specs(&[])),
            vec![ValidationError::EmptyTierTable]
        );
    }

    #[test]
    fn equal_thresholds_are_not_ascending() {
        let specs = vec![
            TierSpec::new("Member", 0, 0),
            TierSpec::new("Bronze", 500, 1),
            TierSpec::new("Copper", 500, 1),
        ];

        assert_eq!(
            errors(validate_tier_specs(&specs)),
            vec![ValidationError::ThresholdsNotAscending {
                name: "Copper".to_string(),
                minimum_points: 500,
                previous: 500,
            }]
        );
    }

    #[test]
    fn decreasing_allowance_is_tolerated() {
        let specs = vec![TierSpec::new("Member", 0, 3), TierSpec::new("Bronze", 10, 1)];
        assert!(errors(validate_tier_specs(&specs)).is_empty());
    }

    #[test]
    fn customer_input_accumulates_violations() {
        let input = CustomerInput {
            id: "  ".to_string(),
            points: -5,
            tier: Some(TierRef(7)),
        };

        let found = errors(validate_customer_input(&input, &TierTable::standard()));

        assert_eq!(found.len(), 3);
        assert!(found.contains(&ValidationError::EmptyCustomerId));
        assert!(found.contains(&ValidationError::NegativePoints { points: -5 }));
        assert!(found.contains(&ValidationError::UnknownTier { ordinal: 7, len: 5 }));
    }

    #[test]
    fn retry_policy_rules() {
        let policy = RetryPolicy {
            max_attempts: 0,
            initial_interval: Duration::from_secs(5),
            backoff_coefficient: 0.5,
            max_interval: Duration::from_secs(1),
        };

        assert_eq!(errors(validate_retry_policy(&policy)).len(), 3);
        assert!(errors(validate_retry_policy(&RetryPolicy::default())).is_empty());
    }

    #[test]
    fn config_collects_errors_from_every_section() {
        let config = LoyaltyConfig {
            tiers: Vec::new(),
            history_threshold: 0,
            notification_retry: RetryPolicy {
                max_attempts: 0,
                ..RetryPolicy::default()
            },
        };

        let found = errors(validate_config(&config));

        assert!(found.contains(&ValidationError::EmptyTierTable));
        assert!(found.contains(&ValidationError::ZeroHistoryThreshold));
        assert!(found.contains(&ValidationError::NoRetryAttempts));
    }
}
