#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use casefetch_core::{
    AuthenticatedClient, AuthenticationError, CasePortal, Credential, MemoryCredentialStore,
    PatientResolver, PortalConfig, PrintableOrderFormParser, SessionManager, SessionRefresher,
};
use serde_json::{Value, json};
use wiremock::MockServer;

pub const STALE_TOKEN: &str = "stale-token";

/// Refresher that hands out `token-1`, `token-2`, ... and counts logins.
///
/// A failing one times out on every attempt instead.
#[derive(Default)]
pub struct CountingRefresher {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingRefresher {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionRefresher for CountingRefresher {
    async fn refresh(&self) -> Result<Credential, AuthenticationError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Err(AuthenticationError::Timeout(Duration::from_secs(60)));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(Credential::new(format!("token-{n}")))
    }
}

pub struct Harness {
    pub refresher: Arc<CountingRefresher>,
    pub store: Arc<MemoryCredentialStore>,
    pub session: Arc<SessionManager>,
    pub config: PortalConfig,
}

impl Harness {
    /// A session whose store already holds [`STALE_TOKEN`].
    pub fn with_stale_token(server: &MockServer) -> Self {
        Self::build(server, Some(STALE_TOKEN), false)
    }

    /// A session holding [`STALE_TOKEN`] whose logins always fail.
    pub fn with_failing_login(server: &MockServer) -> Self {
        Self::build(server, Some(STALE_TOKEN), true)
    }

    /// A session with nothing stored.
    pub fn empty(server: &MockServer) -> Self {
        Self::build(server, None, false)
    }

    fn build(server: &MockServer, token: Option<&str>, fail: bool) -> Self {
        let store = Arc::new(match token {
            Some(t) => MemoryCredentialStore::with_credential(Credential::new(t)),
            None => MemoryCredentialStore::new(),
        });
        let refresher = Arc::new(CountingRefresher {
            fail,
            ..Default::default()
        });
        let session = Arc::new(SessionManager::new(store.clone(), refresher.clone()));
        let config = PortalConfig::new()
            .with_search_url(format!("{}/api/cases/search", server.uri()))
            .with_request_timeout(Duration::from_secs(5))
            .with_fan_out_limit(4)
            .with_max_pages(5);
        Self {
            refresher,
            store,
            session,
            config,
        }
    }

    pub fn client(&self) -> AuthenticatedClient {
        AuthenticatedClient::new(self.session.clone(), &self.config).unwrap()
    }

    pub fn portal(&self) -> CasePortal {
        CasePortal::new(self.client(), &self.config)
    }

    pub fn resolver(&self) -> PatientResolver {
        PatientResolver::new(
            self.portal(),
            Arc::new(PrintableOrderFormParser::new().unwrap()),
            &self.config,
        )
    }
}

pub fn case_json(server: &MockServer, id: &str, name: &str, case_number: &str) -> Value {
    json!({
        "Id": id,
        "PatientName": name,
        "ThreeShapeOrderNo": case_number,
        "Attachments": [
            { "Href": format!("{}/files/{id}-upper.stl", server.uri()), "FileType": "stl", "Name": "upper.stl" },
            { "Href": format!("{}/files/{id}-lower.stl", server.uri()), "FileType": "stl", "Name": "lower.stl" },
            { "Href": format!("{}/forms/{id}.html", server.uri()), "FileType": "html", "Name": "PrintableOrderForm.html" }
        ]
    })
}

pub fn search_page(cases: Vec<Value>, count: u64) -> Value {
    json!({ "Cases": cases, "Count": count })
}

pub fn order_form(case_number: &str, birthday: &str) -> String {
    format!(
        r#"<html><body><table class="tableMain">
<tr><td>Header</td></tr>
<tr><td><table><tbody>
<tr><td>Case</td><td>:</td><td></td><td>{case_number}</td></tr>
<tr><td>Name</td><td>:</td><td></td><td>Someone</td></tr>
<tr><td>Birthday</td><td>:</td><td></td><td>{birthday}</td></tr>
</tbody></table></td></tr>
</table></body></html>"#
    )
}
