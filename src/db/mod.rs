//! High-level store API.
//!
//! `ReferralStore` ties the schema manager and record engine together and
//! hands out typed handles per entity kind.

mod api;
mod applicants;
mod applications;
mod companies;
mod config;
mod referrers;

pub use api::{hash_token, BootstrapReport, EntityHandle, ReferralStore, StoreError, StoreResult};
pub use applicants::{Applicants, PendingUpdate};
pub use applications::Applications;
pub use companies::Companies;
pub use config::{ConfigError, StoreConfig, ENV_CREDENTIALS, ENV_PAGE_SIZE, ENV_TARGET};
pub use referrers::Referrers;
