//! Calls against the lab portal: case search, order forms, attachments.

use std::collections::HashSet;

use bytes::Bytes;

use crate::client::{AuthenticatedClient, RequestSpec};
use crate::config::PortalConfig;
use crate::error::RequestError;
use crate::models::{CaseRecord, CaseSearchPage};

/// Typed access to the portal endpoints, all through one [`AuthenticatedClient`].
#[derive(Debug, Clone)]
pub struct CasePortal {
    client: AuthenticatedClient,
    search_url: String,
    case_states: String,
    max_pages: u32,
}

impl CasePortal {
    pub fn new(client: AuthenticatedClient, config: &PortalConfig) -> Self {
        Self {
            client,
            search_url: config.search_url.clone(),
            case_states: config.case_states_param(),
            max_pages: config.max_pages.max(1),
        }
    }

    pub fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    /// Fetches one page of cases. An empty `search_string` is unfiltered.
    pub async fn search_cases(
        &self,
        search_string: &str,
        page: u32,
    ) -> Result<CaseSearchPage, RequestError> {
        let spec = RequestSpec::get(&self.search_url)?
            .with_query("page", page.to_string())
            .with_query("searchString", search_string)
            .with_query("caseStates", self.case_states.as_str());
        let result: CaseSearchPage = self.client.get_json(&spec).await?;
        tracing::debug!(
            search_string,
            page,
            returned = result.cases.len(),
            count = result.count,
            "Case search"
        );
        Ok(result)
    }

    /// Fetches every case, paging until `Count` is reached, a page adds
    /// nothing new, or the page limit is hit.
    pub async fn search_all(&self) -> Result<Vec<CaseRecord>, RequestError> {
        let mut cases: Vec<CaseRecord> = Vec::new();
        let mut seen = HashSet::new();

        for page in 0..self.max_pages {
            let result = self.search_cases("", page).await?;
            let before = cases.len();
            for case in result.cases {
                if case.id.is_empty() || seen.insert(case.id.clone()) {
                    cases.push(case);
                }
            }

            if cases.len() == before || cases.len() as u64 >= result.count {
                break;
            }
            if page + 1 == self.max_pages {
                tracing::warn!(
                    fetched = cases.len(),
                    count = result.count,
                    "Stopped paging at the page limit"
                );
            }
        }

        Ok(cases)
    }

    /// Fetches an order form document.
    pub async fn fetch_order_form(&self, href: &str) -> Result<String, RequestError> {
        self.client.get_text(&RequestSpec::get(href)?).await
    }

    /// Downloads an attachment as raw bytes.
    pub async fn download_attachment(&self, href: &str) -> Result<Bytes, RequestError> {
        tracing::info!("Downloading {}", href);
        self.client.get_bytes(&RequestSpec::get(href)?).await
    }
}
