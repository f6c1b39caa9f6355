//! Splitting a batch result back into per-instrument results.

use std::collections::HashMap;

use log::debug;

use crate::models::{InstrumentId, NormalizedRecord, RefreshResult};

/// Splits one batch result into one result per member.
///
/// Records are matched to members by their `code` field. A batch-level
/// failure or empty result applies to every member; a member with no matching
/// record is `Empty`. Records that match no member are dropped.
///
/// The output lists members in the order given.
pub fn demultiplex(
    result: RefreshResult,
    members: &[InstrumentId],
) -> Vec<(InstrumentId, RefreshResult)> {
    let records = match result {
        RefreshResult::Ok(records) => records,
        shared => {
            return members
                .iter()
                .map(|id| (id.clone(), shared.clone()))
                .collect()
        }
    };

    let mut by_member: HashMap<usize, Vec<NormalizedRecord>> = HashMap::new();
    let mut unmatched = 0usize;
    for record in records {
        let position = record
            .text("code")
            .and_then(|code| members.iter().position(|id| id.matches_code(code)));
        match position {
            Some(index) => by_member.entry(index).or_default().push(record),
            None => unmatched += 1,
        }
    }
    if unmatched > 0 {
        debug!(
            "Dropped {} batch record(s) matching none of {} requested instruments",
            unmatched,
            members.len()
        );
    }

    members
        .iter()
        .enumerate()
        .map(|(index, id)| {
            let records = by_member.remove(&index).unwrap_or_default();
            (id.clone(), RefreshResult::from_records(records))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorKind, RefreshError};
    use crate::models::Market;

    fn id(code: &str) -> InstrumentId {
        InstrumentId::new(Market::Hk, code)
    }

    fn quote(code: &str) -> NormalizedRecord {
        NormalizedRecord::new().with("code", code)
    }

    #[test]
    fn test_records_routed_by_code() {
        let members = vec![id("00700"), id("09988"), id("00005")];
        let result = RefreshResult::Ok(vec![quote("HK.09988"), quote("00700"), quote("HK.03690")]);

        let split = demultiplex(result, &members);

        assert_eq!(split.len(), 3);
        assert_eq!(split[0].0, id("00700"));
        assert_eq!(split[0].1.records().len(), 1);
        assert_eq!(split[1].1.records()[0].text("code"), Some("HK.09988"));
        assert_eq!(split[2].1, RefreshResult::Empty);
    }

    #[test]
    fn test_batch_failure_applies_to_every_member() {
        let members = vec![id("00700"), id("09988")];
        let error = RefreshError::new(ErrorKind::UpstreamError, "gateway down");

        let split = demultiplex(RefreshResult::Failed(error.clone()), &members);

        assert!(split
            .iter()
            .all(|(_, result)| *result == RefreshResult::Failed(error.clone())));
    }

    #[test]
    fn test_batch_empty_applies_to_every_member() {
        let members = vec![id("00700"), id("09988")];
        let split = demultiplex(RefreshResult::Empty, &members);
        assert!(split.iter().all(|(_, result)| result.is_empty()));
    }
}
