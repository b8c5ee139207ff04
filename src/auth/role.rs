use serde::{Deserialize, Serialize};

/// Closed role set; every privileged route declares which of these it
/// accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

/// Account lifecycle state. `Banned` may only be applied by an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_status", rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Suspended,
    Banned,
}

pub const STAFF: &[Role] = &[Role::Moderator, Role::Admin];
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Moderator).unwrap(), "\"moderator\"");
        assert_eq!(serde_json::to_string(&UserStatus::Banned).unwrap(), "\"banned\"");
    }

    #[test]
    fn staff_set_excludes_plain_users() {
        assert!(!STAFF.contains(&Role::User));
        assert!(STAFF.contains(&Role::Moderator));
        assert!(STAFF.contains(&Role::Admin));
        assert_eq!(ADMIN_ONLY, &[Role::Admin]);
    }
}
