//! Session-cached access to the lab portal and patient case resolution.
//!
//! The crate is organised leaves first:
//!
//! - [`credential`] - the single persisted session token
//! - [`session`] - re-authentication and the process-wide token cache
//! - [`client`] - bearer-authenticated requests with one refresh-and-retry
//! - [`order_form`] - birthday and case number extraction from order forms
//! - [`portal`] - the portal's case-search, order-form and attachment calls
//! - [`resolver`] - name match with birthdate correlation fallback
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use casefetch_core::{
//!     AuthenticatedClient, CasePortal, CommandRefresher, FileCredentialStore, PatientResolver,
//!     PortalConfig, PrintableOrderFormParser, SessionManager,
//! };
//!
//! let config = PortalConfig::default();
//! let store = Arc::new(FileCredentialStore::new("/tmp/credentials.json"));
//! let refresher = Arc::new(CommandRefresher::new("portal-login"));
//! let session = Arc::new(SessionManager::new(store, refresher));
//! let client = AuthenticatedClient::new(session, &config)?;
//! let portal = CasePortal::new(client, &config);
//! let resolver = PatientResolver::new(portal, Arc::new(PrintableOrderFormParser::new()?), &config);
//!
//! let resolution = resolver.resolve("Rustan", "5/21/1992").await?;
//! ```

pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod models;
pub mod order_form;
pub mod portal;
pub mod resolver;
pub mod session;

pub use client::{AuthenticatedClient, RequestSpec};
pub use config::PortalConfig;
pub use credential::{Credential, CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::{AuthenticationError, CredentialStoreError, OrderFormError, RequestError, ResolveError};
pub use models::{BirthdayRecord, Candidate, CaseRecord, CaseSearchPage, PatientMatch, Resolution};
pub use order_form::{OrderFormParser, PrintableOrderFormParser};
pub use portal::CasePortal;
pub use resolver::PatientResolver;
pub use session::{AccountSecrets, CommandRefresher, SessionManager, SessionRefresher};
