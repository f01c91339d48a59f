//! Record validation: drop candidates without a natural key.

use crate::types::CandidateRecord;

/// Output of validation.
#[derive(Debug, Clone, Default)]
pub struct Validated {
    /// Candidates with a non-blank natural key, in input order.
    pub records: Vec<CandidateRecord>,
    /// Zero-based input positions of rejected candidates.
    pub rejected: Vec<usize>,
}

impl Validated {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Keep the candidates whose natural key is present and not blank.
pub fn validate(records: Vec<CandidateRecord>) -> Validated {
    let mut validated = Validated::default();
    for (position, record) in records.into_iter().enumerate() {
        if record.has_key() {
            validated.records.push(record);
        } else {
            validated.rejected.push(position);
        }
    }
    validated
}
