//! Client for the hosted backend behind copydesk: REST tables, password auth
//! and admin functions, plus the reports and CSV exports built on them.
//!
//! [`BackendClient`] also implements [`wards::PrincipalStore`] and
//! [`wards::UsageLedger`], so an `Arc<BackendClient>` can be handed straight
//! to [`wards::AccessPolicy`].

pub mod auth;
pub mod client;
pub mod error;
pub mod export;
pub mod functions;
pub mod models;
pub mod prefills;
pub mod principals;
pub mod report;
pub mod rest;
pub mod sessions;
pub mod templates;
pub mod usage;
pub mod users;

pub use auth::SessionManager;
pub use client::BackendClient;
pub use error::BackendError;
pub use models::{
    CopySession, NewPrefill, NewTemplate, Prefill, PrefillPatch, PrincipalUpdate, SavedOutput,
    Template, TemplatePatch, UserProfile,
};
pub use principals::PrincipalFilter;
pub use report::{UsageReport, UsageTotals, UserUsage};
pub use users::{CreatedUser, NewUser};
