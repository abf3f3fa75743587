use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A request that is well-formed but breaks a session policy
    /// (disallowed extension step, extension past the cap).
    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
