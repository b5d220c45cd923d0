//! Per-item results for operations applied to a list of ids.

use serde::Serialize;

use crate::error::DomainError;

/// One item that failed, with the error kind and reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure<K> {
    pub id: K,
    pub error: &'static str,
    pub message: String,
}

/// Outcome of a batch: each item succeeds or fails on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome<K> {
    pub success_count: usize,
    pub failure_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<BatchFailure<K>>,
}

impl<K> Default for BatchOutcome<K> {
    fn default() -> Self {
        Self {
            success_count: 0,
            failure_count: 0,
            failures: Vec::new(),
        }
    }
}

impl<K> BatchOutcome<K> {
    pub fn record(&mut self, id: K, result: Result<(), DomainError>) {
        match result {
            Ok(()) => self.success_count += 1,
            Err(err) => {
                self.failure_count += 1;
                self.failures.push(BatchFailure {
                    id,
                    error: err.code(),
                    message: err.reason().to_string(),
                });
            }
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failure_count == 0
    }
}
