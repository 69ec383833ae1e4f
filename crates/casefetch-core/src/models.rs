//! Portal payloads and resolution results.

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// File type of printable model attachments.
pub const STL_FILE_TYPE: &str = "stl";

/// Attachment name of the printable order form.
pub const ORDER_FORM_NAME: &str = "PrintableOrderForm.html";

/// Message rendered for [`Resolution::NoMatch`].
pub const NO_MATCH_MESSAGE: &str = "no match found";

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A file attached to a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Attachment {
    #[serde(default, deserialize_with = "null_as_default")]
    pub href: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub file_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

impl Attachment {
    pub fn is_stl(&self) -> bool {
        self.file_type.eq_ignore_ascii_case(STL_FILE_TYPE)
    }

    pub fn is_order_form(&self) -> bool {
        self.name == ORDER_FORM_NAME
    }
}

/// One case as returned by the case-search endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CaseRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub patient_name: String,
    /// External-facing case number, also printed on the order form.
    #[serde(
        rename = "ThreeShapeOrderNo",
        default,
        deserialize_with = "null_as_default"
    )]
    pub case_number: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attachments: Vec<Attachment>,
}

impl CaseRecord {
    /// Hrefs of the case's STL attachments, in attachment order.
    pub fn stl_hrefs(&self) -> Vec<String> {
        self.attachments
            .iter()
            .filter(|a| a.is_stl())
            .map(|a| a.href.clone())
            .collect()
    }

    /// Href of the first printable order form, if the case has one.
    pub fn order_form_href(&self) -> Option<&str> {
        self.attachments
            .iter()
            .find(|a| a.is_order_form() && !a.href.is_empty())
            .map(|a| a.href.as_str())
    }

    /// Projects the case down to what birthdate correlation needs.
    ///
    /// Returns `None` for cases without an order form.
    pub fn to_candidate(&self) -> Option<Candidate> {
        let order_form_href = self.order_form_href()?.to_string();
        Some(Candidate {
            id: self.id.clone(),
            order_form_href,
            attachment_hrefs: self.stl_hrefs(),
            case_number: self.case_number.clone(),
        })
    }

    pub fn to_match(&self, full_name_match: bool) -> PatientMatch {
        PatientMatch {
            name: self.patient_name.clone(),
            attachments_hrefs: self.stl_hrefs(),
            full_name_match,
        }
    }
}

/// One page of case-search results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CaseSearchPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub cases: Vec<CaseRecord>,
    /// Total number of cases matching the search, across all pages.
    #[serde(default, deserialize_with = "null_as_default")]
    pub count: u64,
}

/// A case projected for order form correlation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub order_form_href: String,
    pub attachment_hrefs: Vec<String>,
    pub case_number: String,
}

/// Birthday and case number read from one order form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BirthdayRecord {
    pub birthday: String,
    pub case_number: String,
}

impl BirthdayRecord {
    /// Returns `true` if the order form yielded no usable birthday.
    pub fn is_empty(&self) -> bool {
        self.birthday.is_empty()
    }
}

/// A matched patient and the STL attachments of their case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientMatch {
    pub name: String,
    pub attachments_hrefs: Vec<String>,
    pub full_name_match: bool,
}

/// Outcome of one resolution request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The name search returned at least one case; this is the first one.
    NameMatch(PatientMatch),
    /// Cases correlated by birthdate. Never empty.
    BirthdateMatches(Vec<PatientMatch>),
    /// Neither name nor birthdate matched anything.
    NoMatch,
}

impl Resolution {
    /// All matched patients, regardless of which path produced them.
    pub fn matches(&self) -> &[PatientMatch] {
        match self {
            Self::NameMatch(m) => std::slice::from_ref(m),
            Self::BirthdateMatches(ms) => ms,
            Self::NoMatch => &[],
        }
    }

    pub fn is_no_match(&self) -> bool {
        matches!(self, Self::NoMatch)
    }
}

impl Serialize for Resolution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::NameMatch(m) => m.serialize(serializer),
            Self::BirthdateMatches(ms) => ms.serialize(serializer),
            Self::NoMatch => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("message", NO_MATCH_MESSAGE)?;
                map.end()
            }
        }
    }
}
