//! `stockledger-auth` — credential verification, session tokens and role checks.
//!
//! Decoupled from HTTP and from any concrete store: users are looked up
//! through [`CredentialStore`].

pub mod authorize;
pub mod claims;
pub mod password;
pub mod roles;
pub mod token;
pub mod user;

pub use authorize::{AuthzError, authorize};
pub use claims::{Claims, TokenValidationError, validate_claims};
pub use password::{
    HASH_COST, PasswordError, hash_password_with_cost, verify_password, verify_password_blocking,
};
pub use roles::{Role, UnknownRole};
pub use token::{AuthError, TOKEN_TTL_HOURS, TokenError, TokenService};
pub use user::{CredentialStore, CredentialStoreError, User};
