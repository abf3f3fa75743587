//! Role names carried in the `role` claim of access tokens.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_PARTICIPANT: &str = "participant";

/// Tokens carrying any other role are refused at the edge.
pub fn is_known_role(role: &str) -> bool {
    matches!(role, ROLE_PARTICIPANT | ROLE_ADMIN)
}
