//! Record engine
//!
//! Row lookup, identifier minting, record writes and list views, all built
//! on the schema manager and cell codec.

mod crud;
mod error;
mod ident;
mod locator;
mod outcome;
mod query;

pub use crud::{CrudEngine, IdPolicy, LAST_UPDATED};
pub use error::{EngineError, EngineResult};
pub use ident::{parse_sequence, IdGenerator, IdScheme};
pub use locator::{
    identity_agreement, normalize_key, normalize_name, normalize_phone, Identity,
    IdentityColumns, RowLocator,
};
pub use outcome::{PatchOutcome, UpsertOutcome};
pub use query::{
    Eligibility, EligibilityReason, EligibilityRule, ListItem, ListOptions, ListProfile,
    ListResult, QueryEngine, DEFAULT_PAGE_SIZE,
};
