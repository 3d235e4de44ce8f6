//! Referral Store - a record store over a remote tabular service
//!
//! Applicants, referrers, referrer companies and applications are kept one
//! per row in named sheets whose first row is the schema. The backing service
//! offers no transactions, indexes or uniqueness constraints; this crate adds
//! schema growth, identifier minting, name-scoped patches and list views on
//! top of it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use referral_store::db::{ReferralStore, StoreConfig};
//! use referral_store::engine::ListOptions;
//! use referral_store::storage::InMemoryBackend;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let store = ReferralStore::new(Arc::new(InMemoryBackend::new()), StoreConfig::new("local"))?;
//! store.bootstrap().await?;
//! let page = store.applicants().list(&ListOptions::new().search("ada")).await?;
//! println!("{} matches", page.total);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod db;
pub mod engine;
pub mod entities;
pub mod record;
pub mod storage;
