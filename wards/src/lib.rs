//! Access policy for copydesk principals.
//!
//! [`policy::AccessPolicy`] evaluates the subscription window and token quota
//! gates; [`gate::LoginGate`] applies it on login and session restore.

pub mod config;
pub mod gate;
pub mod memory;
pub mod model;
pub mod policy;
pub mod store;
pub mod window;

pub use config::PolicyConfig;
pub use gate::{GateError, LoginGate, LoginOutcome};
pub use model::{AccessDecision, DenialKind, Principal, Role, UsageRecord};
pub use policy::AccessPolicy;
pub use store::{
    Credentials, IdentityError, IdentityProvider, LookupError, PrincipalStore, Session,
    SessionPrincipal, UsageLedger,
};
