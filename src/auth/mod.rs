//! Authentication Module
//! Login tokens, role permissions and the guard every handler runs through

pub mod api;
pub mod credential_store;
pub mod guard;
pub mod models;
pub mod permissions;
pub mod token;

pub use credential_store::CredentialStore;
pub use guard::{AuthService, Caller};
pub use models::{ActionKey, AuthError, IdentityKind};
pub use permissions::PermissionGate;
pub use token::{ExpiredTokenPolicy, TokenValidator};
