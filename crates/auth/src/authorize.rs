use thiserror::Error;

use crate::{Claims, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: role '{role}' is not allowed")]
    Forbidden { role: Role },
}

/// Allow-list check for a single operation.
///
/// - No IO
/// - No panics
/// - An empty allow-list admits nobody
pub fn authorize(claims: &Claims, allowed: &[Role]) -> Result<(), AuthzError> {
    if allowed.contains(&claims.role) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden { role: claims.role })
    }
}
