// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Configuration validation for pipeline deployments.
//!
//! Every process of a deployment reads the same configuration, so a mistake
//! here tends to surface much later as a barrier that never releases or a
//! category that never drains. Validation runs up front and reports every
//! problem at once instead of stopping at the first one.
//!
//! # Checks
//!
//! 1. **Categories**: names are unique and every category expects at least one batch
//! 2. **Queues**: category, completion and dead-letter queues are pairwise distinct
//! 3. **Merge policy**: a category expecting several batches needs `concatenate`
//! 4. **Workers**: IDs are unique and every worker targets a declared category
//! 5. **Coverage**: each category has exactly `expected_batches` workers
//! 6. **Retry**: at least one connection attempt is allowed
//! 7. **Barrier**: an explicit `expected` that differs from the worker count is a warning
//!
//! # Example
//! ```rust
//! use the_fan_in::config::{parse_config, validate_config, ConfigFormat};
//! use the_fan_in::errors::ValidationError;
//!
//! let cfg = parse_config(
//!     r#"
//! categories:
//!   - name: data
//!     queue: data_queue
//!   - name: data
//!     queue: other_queue
//! workers:
//!   - id: data-worker
//!     category: data
//! "#,
//!     ConfigFormat::Yaml,
//! )
//! .unwrap();
//!
//! let findings = validate_config(&cfg);
//! assert_eq!(
//!     findings,
//!     vec![ValidationError::DuplicateCategory { category: "data".to_string() }]
//! );
//! ```

use std::collections::HashSet;

use crate::config::Config;
use crate::errors::ValidationError;
use crate::model::MergePolicy;

/// Validate a configuration, returning every finding (errors and warnings).
///
/// An empty vector means the configuration is usable as-is. Use
/// [`ValidationError::is_warning`] to separate advisory findings.
pub fn validate_config(config: &Config) -> Vec<ValidationError> {
    let mut findings = Vec::new();

    validate_categories(config, &mut findings);
    validate_queues(config, &mut findings);
    validate_workers(config, &mut findings);
    validate_category_workers(config, &mut findings);

    if config.retry.max_attempts == 0 {
        findings.push(ValidationError::ZeroConnectionAttempts);
    }

    if let Some(expected) = config.barrier.expected {
        if expected != config.workers.len() && !config.workers.is_empty() {
            findings.push(ValidationError::ExpectedWorkerCountMismatch {
                expected,
                configured: config.workers.len(),
            });
        }
    }

    findings
}

fn validate_categories(config: &Config, findings: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for category in &config.categories {
        if !seen.insert(category.name.as_str()) {
            findings.push(ValidationError::DuplicateCategory {
                category: category.name.clone(),
            });
        }
        if category.expected_batches == 0 {
            findings.push(ValidationError::ZeroExpectedBatches {
                category: category.name.clone(),
            });
        } else if category.expected_batches > 1
            && config.aggregator.merge_policy == MergePolicy::Reject
        {
            findings.push(ValidationError::MultipleBatchesRejected {
                category: category.name.clone(),
                expected_batches: category.expected_batches,
            });
        }
    }
}

fn validate_queues(config: &Config, findings: &mut Vec<ValidationError>) {
    let queues = config
        .categories
        .iter()
        .map(|c| c.queue.as_str())
        .chain(std::iter::once(config.completion_queue.as_str()))
        .chain(config.dead_letter_queue.as_deref());

    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for queue in queues {
        if !seen.insert(queue) && reported.insert(queue) {
            findings.push(ValidationError::DuplicateQueue {
                queue: queue.to_string(),
            });
        }
    }
}

fn validate_workers(config: &Config, findings: &mut Vec<ValidationError>) {
    let categories: HashSet<&str> = config.categories.iter().map(|c| c.name.as_str()).collect();
    let mut ids = HashSet::new();

    for worker in &config.workers {
        if !ids.insert(worker.id.as_str()) {
            findings.push(ValidationError::DuplicateWorkerId {
                worker_id: worker.id.clone(),
            });
        }
        if !categories.contains(worker.category.as_str()) {
            findings.push(ValidationError::UnknownWorkerCategory {
                worker_id: worker.id.clone(),
                category: worker.category.clone(),
            });
        }
    }
}

/// Each category drains exactly `expected_batches` batches, one per worker.
fn validate_category_workers(config: &Config, findings: &mut Vec<ValidationError>) {
    let mut checked = HashSet::new();
    for category in &config.categories {
        if category.expected_batches == 0 || !checked.insert(category.name.as_str()) {
            continue;
        }
        let workers = config
            .workers
            .iter()
            .filter(|w| w.category == category.name)
            .count();
        if workers != category.expected_batches {
            findings.push(ValidationError::CategoryWorkerCountMismatch {
                category: category.name.clone(),
                expected_batches: category.expected_batches,
                workers,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, ConfigFormat};

    fn config(yaml: &str) -> Config {
        parse_config(yaml, ConfigFormat::Yaml).unwrap()
    }

    const VALID: &str = r#"
categories:
  - name: data
    queue: data_queue
  - name: signal
    queue: signal_data_queue
workers:
  - id: data-worker
    category: data
  - id: signal-worker
    category: signal
"#;

    #[test]
    fn test_valid_config_has_no_findings() {
        assert!(validate_config(&config(VALID)).is_empty());
    }

    #[test]
    fn test_completion_queue_collides_with_category_queue() {
        let cfg = config(
            r#"
completion_queue: data_queue
categories:
  - name: data
    queue: data_queue
workers:
  - id: data-worker
    category: data
"#,
        );
        assert_eq!(
            validate_config(&cfg),
            vec![ValidationError::DuplicateQueue {
                queue: "data_queue".to_string()
            }]
        );
    }

    #[test]
    fn test_dead_letter_queue_collision_reported_once() {
        let cfg = config(
            r#"
dead_letter_queue: data_queue
categories:
  - name: data
    queue: data_queue
  - name: signal
    queue: data_queue
"#,
        );
        let findings = validate_config(&cfg);
        assert_eq!(
            findings
                .iter()
                .filter(|f| matches!(f, ValidationError::DuplicateQueue { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn test_unknown_category_and_duplicate_worker() {
        let cfg = config(
            r#"
categories:
  - name: data
    queue: data_queue
workers:
  - id: w1
    category: data
  - id: w1
    category: background
"#,
        );
        let findings = validate_config(&cfg);
        assert!(findings.contains(&ValidationError::DuplicateWorkerId {
            worker_id: "w1".to_string()
        }));
        assert!(findings.contains(&ValidationError::UnknownWorkerCategory {
            worker_id: "w1".to_string(),
            category: "background".to_string()
        }));
    }

    #[test]
    fn test_multiple_batches_need_concatenate() {
        let yaml = r#"
categories:
  - name: data
    queue: data_queue
    expected_batches: 2
workers:
  - id: data-worker-a
    category: data
  - id: data-worker-b
    category: data
"#;
        assert_eq!(
            validate_config(&config(yaml)),
            vec![ValidationError::MultipleBatchesRejected {
                category: "data".to_string(),
                expected_batches: 2
            }]
        );

        let concatenating = config(&format!("{}aggregator:\n  merge_policy: concatenate\n", yaml));
        assert!(validate_config(&concatenating).is_empty());
    }

    #[test]
    fn test_category_worker_counts_must_match_expected_batches() {
        let cfg = config(
            r#"
categories:
  - name: data
    queue: data_queue
  - name: signal
    queue: signal_data_queue
workers:
  - id: data-worker-a
    category: data
  - id: data-worker-b
    category: data
"#,
        );
        let findings = validate_config(&cfg);
        assert_eq!(
            findings,
            vec![
                ValidationError::CategoryWorkerCountMismatch {
                    category: "data".to_string(),
                    expected_batches: 1,
                    workers: 2
                },
                ValidationError::CategoryWorkerCountMismatch {
                    category: "signal".to_string(),
                    expected_batches: 1,
                    workers: 0
                },
            ]
        );
        assert!(findings.iter().all(|f| !f.is_warning()));
    }

    #[test]
    fn test_zero_expected_batches_and_attempts() {
        let cfg = config(
            r#"
retry:
  max_attempts: 0
categories:
  - name: data
    queue: data_queue
    expected_batches: 0
"#,
        );
        let findings = validate_config(&cfg);
        assert!(findings.contains(&ValidationError::ZeroConnectionAttempts));
        assert!(findings.contains(&ValidationError::ZeroExpectedBatches {
            category: "data".to_string()
        }));
        assert!(findings.iter().all(|f| !f.is_warning()));
    }

    #[test]
    fn test_expected_count_mismatch_is_only_a_warning() {
        let cfg = config(&format!("{}barrier:\n  expected: 4\n", VALID));
        let findings = validate_config(&cfg);
        assert_eq!(
            findings,
            vec![ValidationError::ExpectedWorkerCountMismatch {
                expected: 4,
                configured: 2
            }]
        );
        assert!(findings[0].is_warning());
    }
}
