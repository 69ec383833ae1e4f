//! Patient resolution: name search first, birthdate correlation second.
//!
//! ```text
//! SEARCH_BY_NAME --count > 0--> NAME_MATCH (first case)
//!       |
//!   count == 0
//!       v
//!   SEARCH_ALL --> CORRELATE --matches--> BIRTHDATE_MATCHES
//!                      |
//!                      +--none--> NO_MATCH
//! ```
//!
//! During CORRELATE every case's order form is fetched and parsed
//! concurrently. A candidate whose fetch or parse fails is logged and left
//! out; it never aborts the others. A failed re-authentication is different:
//! no later candidate could succeed either, so it fails the resolution.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt, TryStreamExt};

use crate::config::PortalConfig;
use crate::error::{RequestError, ResolveError};
use crate::models::{BirthdayRecord, Candidate, CaseRecord, PatientMatch, Resolution};
use crate::order_form::OrderFormParser;
use crate::portal::CasePortal;

pub struct PatientResolver {
    portal: CasePortal,
    parser: Arc<dyn OrderFormParser>,
    fan_out_limit: usize,
}

impl PatientResolver {
    pub fn new(portal: CasePortal, parser: Arc<dyn OrderFormParser>, config: &PortalConfig) -> Self {
        Self {
            portal,
            parser,
            fan_out_limit: config.fan_out_limit.max(1),
        }
    }

    pub fn portal(&self) -> &CasePortal {
        &self.portal
    }

    /// Resolves `name` to a case, falling back to `birthdate` correlation.
    ///
    /// A blank `name` skips the name search, since an unfiltered search
    /// would match every case.
    ///
    /// # Errors
    ///
    /// Fails if one of the two searches fails, or if re-authentication fails
    /// while order forms are fetched. Other order form failures are isolated
    /// per candidate.
    pub async fn resolve(&self, name: &str, birthdate: &str) -> Result<Resolution, ResolveError> {
        let name = name.trim();

        if !name.is_empty() {
            let page = self
                .portal
                .search_cases(name, 0)
                .await
                .map_err(ResolveError::NameSearch)?;

            if page.count > 0
                && let Some(first) = page.cases.first()
            {
                tracing::info!(name, case_id = %first.id, "Matched patient by name");
                return Ok(Resolution::NameMatch(first.to_match(true)));
            }
            tracing::info!(name, "No case matches the name, correlating by birthdate");
        }

        let cases = self
            .portal
            .search_all()
            .await
            .map_err(ResolveError::FullSearch)?;
        self.correlate(&cases, birthdate).await
    }

    async fn correlate(&self, cases: &[CaseRecord], birthdate: &str) -> Result<Resolution, ResolveError> {
        let candidates: Vec<Candidate> = cases
            .iter()
            .filter_map(|case| {
                let candidate = case.to_candidate();
                if candidate.is_none() {
                    tracing::debug!(case_id = %case.id, "Case has no order form, skipping");
                }
                candidate
            })
            .collect();

        tracing::info!(
            cases = cases.len(),
            candidates = candidates.len(),
            "Correlating order forms by birthdate"
        );

        let records = self
            .fetch_birthdays(&candidates)
            .await
            .map_err(ResolveError::Correlate)?;
        Ok(correlate_records(cases, &records, birthdate))
    }

    /// Fetches and parses every candidate's order form, in submission order.
    ///
    /// Stops at the first authentication failure; pending fetches are dropped.
    async fn fetch_birthdays(
        &self,
        candidates: &[Candidate],
    ) -> Result<Vec<Option<BirthdayRecord>>, RequestError> {
        stream::iter(candidates)
            .map(|candidate| self.fetch_birthday(candidate))
            .buffered(self.fan_out_limit)
            .try_collect()
            .await
    }

    async fn fetch_birthday(&self, candidate: &Candidate) -> Result<Option<BirthdayRecord>, RequestError> {
        match self.portal.fetch_order_form(&candidate.order_form_href).await {
            Ok(document) => {
                let record = self.parser.parse(&document);
                if record.is_empty() {
                    tracing::warn!(case_id = %candidate.id, "Order form has no readable birthday");
                    return Ok(None);
                }
                Ok(Some(record))
            }
            Err(e) if e.is_authentication() => {
                tracing::error!(case_id = %candidate.id, "Re-authentication failed during correlation: {}", e);
                Err(e)
            }
            Err(e) => {
                tracing::warn!(case_id = %candidate.id, "Failed to fetch order form: {}", e);
                Ok(None)
            }
        }
    }
}

/// Joins parsed order forms back to `cases` by case number.
///
/// Every case whose case number belongs to a record with a matching
/// birthday is returned, in `cases` order. Birthdays and case numbers are
/// compared trimmed.
pub fn correlate_records(
    cases: &[CaseRecord],
    records: &[Option<BirthdayRecord>],
    birthdate: &str,
) -> Resolution {
    let birthdate = birthdate.trim();
    let matched: HashSet<&str> = records
        .iter()
        .flatten()
        .filter(|r| r.birthday.trim() == birthdate)
        .map(|r| r.case_number.trim())
        .filter(|case_number| !birthdate.is_empty() && !case_number.is_empty())
        .collect();

    if matched.is_empty() {
        return Resolution::NoMatch;
    }

    let matches: Vec<PatientMatch> = cases
        .iter()
        .filter(|case| matched.contains(case.case_number.trim()))
        .map(|case| case.to_match(false))
        .collect();

    if matches.is_empty() {
        tracing::warn!("Matched order forms do not belong to any listed case");
        return Resolution::NoMatch;
    }
    Resolution::BirthdateMatches(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Attachment;

    fn case(id: &str, name: &str, case_number: &str) -> CaseRecord {
        CaseRecord {
            id: id.to_string(),
            patient_name: name.to_string(),
            case_number: case_number.to_string(),
            attachments: vec![Attachment {
                href: format!("https://files/{id}.stl"),
                file_type: "stl".to_string(),
                name: format!("{id}.stl"),
            }],
        }
    }

    fn record(birthday: &str, case_number: &str) -> Option<BirthdayRecord> {
        Some(BirthdayRecord {
            birthday: birthday.to_string(),
            case_number: case_number.to_string(),
        })
    }

    #[test]
    fn test_single_birthday_match() {
        let cases = vec![
            case("a", "Alice", "CN-1"),
            case("b", "Bob", "CN-42"),
            case("c", "Carol", "CN-3"),
        ];
        let records = vec![
            record("1/1/1970", "CN-1"),
            record("5/21/1992", "CN-42"),
            record("2/2/1980", "CN-3"),
        ];

        let resolution = correlate_records(&cases, &records, "5/21/1992");
        assert_eq!(
            resolution,
            Resolution::BirthdateMatches(vec![PatientMatch {
                name: "Bob".to_string(),
                attachments_hrefs: vec!["https://files/b.stl".to_string()],
                full_name_match: false,
            }])
        );
    }

    #[test]
    fn test_shared_case_number_includes_every_case() {
        let cases = vec![
            case("a", "Alice", "CN-9"),
            case("b", "Alice R.", "CN-9"),
            case("c", "Carol", "CN-3"),
        ];
        let records = vec![record("5/21/1992", "CN-9"), None, record("2/2/1980", "CN-3")];

        let resolution = correlate_records(&cases, &records, "5/21/1992");
        let names: Vec<_> = resolution.matches().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Alice R."]);
    }

    #[test]
    fn test_no_matching_birthday() {
        let cases = vec![case("a", "Alice", "CN-1")];
        let records = vec![record("1/1/1970", "CN-1")];
        assert_eq!(
            correlate_records(&cases, &records, "5/21/1992"),
            Resolution::NoMatch
        );
    }

    #[test]
    fn test_failed_and_empty_records_never_match() {
        let cases = vec![case("a", "Alice", ""), case("b", "Bob", "CN-2")];
        let records = vec![record("", ""), None, record("5/21/1992", "")];

        assert_eq!(correlate_records(&cases, &records, ""), Resolution::NoMatch);
        assert_eq!(
            correlate_records(&cases, &records, "5/21/1992"),
            Resolution::NoMatch
        );
    }

    #[test]
    fn test_untrimmed_fields_still_match() {
        let cases = vec![case("a", "Alice", "CN-1"), case("b", "Bob", " CN-42\n")];
        let records = vec![record("1/1/1970", "CN-1"), record("\n 5/21/1992 ", "CN-42 ")];

        let resolution = correlate_records(&cases, &records, "5/21/1992");
        let names: Vec<_> = resolution.matches().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Bob"]);
    }

    #[test]
    fn test_matched_case_number_missing_from_cases() {
        let cases = vec![case("a", "Alice", "CN-1")];
        let records = vec![record("5/21/1992", "CN-404")];
        assert_eq!(
            correlate_records(&cases, &records, " 5/21/1992 "),
            Resolution::NoMatch
        );
    }
}
