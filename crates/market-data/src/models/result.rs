use super::record::NormalizedRecord;
use crate::errors::{ErrorKind, RefreshError};

/// Outcome of one refresh attempt for one instrument and data kind.
///
/// `Ok` always carries at least one record; a call that yields no rows is
/// `Empty`, which is a success that leaves existing data untouched.
#[derive(Clone, Debug, PartialEq)]
pub enum RefreshResult {
    Ok(Vec<NormalizedRecord>),
    Empty,
    Failed(RefreshError),
}

impl RefreshResult {
    /// `Ok` for a non-empty list, `Empty` otherwise.
    pub fn from_records(records: Vec<NormalizedRecord>) -> Self {
        if records.is_empty() {
            RefreshResult::Empty
        } else {
            RefreshResult::Ok(records)
        }
    }

    pub fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        RefreshResult::Failed(RefreshError::new(kind, message))
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, RefreshResult::Ok(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RefreshResult::Empty)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RefreshResult::Failed(_))
    }

    pub fn records(&self) -> &[NormalizedRecord] {
        match self {
            RefreshResult::Ok(records) => records,
            _ => &[],
        }
    }

    pub fn error(&self) -> Option<&RefreshError> {
        match self {
            RefreshResult::Failed(error) => Some(error),
            _ => None,
        }
    }

    fn severity(&self) -> u8 {
        match self {
            RefreshResult::Ok(_) => 0,
            RefreshResult::Empty => 1,
            RefreshResult::Failed(_) => 2,
        }
    }

    /// Picks the worse of two outcomes (`Failed` > `Empty` > `Ok`).
    ///
    /// On a tie the left-hand side wins.
    pub fn worst<'a>(&'a self, other: &'a RefreshResult) -> &'a RefreshResult {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}
