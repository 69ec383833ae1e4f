//! Birthday and case number extraction from printable order forms.

use scraper::{Html, Selector};

use crate::error::OrderFormError;
use crate::models::BirthdayRecord;

const BIRTHDAY_SELECTOR: &str =
    ".tableMain tr:nth-child(2) > td > table > tbody > tr:nth-child(3) > td:nth-child(4)";
const CASE_NUMBER_SELECTOR: &str =
    ".tableMain tr:nth-child(2) > td > table > tbody > tr:nth-child(1) > td:nth-child(4)";

/// Reads a [`BirthdayRecord`] out of an order form document.
///
/// Documents that do not have the expected structure yield empty fields.
pub trait OrderFormParser: Send + Sync {
    fn parse(&self, document: &str) -> BirthdayRecord;
}

/// Parser for the portal's `PrintableOrderForm.html` layout.
///
/// The patient block is the second row of `.tableMain`; inside its nested
/// table, row 1 column 4 holds the case number and row 3 column 4 the
/// birthday.
#[derive(Debug, Clone)]
pub struct PrintableOrderFormParser {
    birthday: Selector,
    case_number: Selector,
}

impl PrintableOrderFormParser {
    pub fn new() -> Result<Self, OrderFormError> {
        Ok(Self {
            birthday: compile(BIRTHDAY_SELECTOR)?,
            case_number: compile(CASE_NUMBER_SELECTOR)?,
        })
    }
}

fn compile(selector: &str) -> Result<Selector, OrderFormError> {
    Selector::parse(selector).map_err(|e| OrderFormError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

fn cell_text(document: &Html, selector: &Selector) -> String {
    document
        .select(selector)
        .next()
        .map(|cell| cell.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

impl OrderFormParser for PrintableOrderFormParser {
    fn parse(&self, document: &str) -> BirthdayRecord {
        let html = Html::parse_document(document);
        BirthdayRecord {
            birthday: cell_text(&html, &self.birthday),
            case_number: cell_text(&html, &self.case_number),
        }
    }
}
