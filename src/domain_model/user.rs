use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(
    Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct UserId(pub uuid::Uuid);

impl UserId {
    pub fn new_v4() -> Self {
        UserId(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::from_str(s).map(UserId)
    }
}

#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    User,
    Moderator,
    Admin,
    Developer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "USER",
            UserRole::Moderator => "MODERATOR",
            UserRole::Admin => "ADMIN",
            UserRole::Developer => "DEVELOPER",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl std::str::FromStr for UserRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "USER" => Ok(UserRole::User),
            "MODERATOR" => Ok(UserRole::Moderator),
            "ADMIN" => Ok(UserRole::Admin),
            "DEVELOPER" => Ok(UserRole::Developer),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Role set of a user. Always contains [`UserRole::User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "BTreeSet<UserRole>", from = "BTreeSet<UserRole>")]
pub struct Roles(BTreeSet<UserRole>);

impl Roles {
    pub fn new(roles: impl IntoIterator<Item = UserRole>) -> Self {
        let mut set: BTreeSet<UserRole> = roles.into_iter().collect();
        set.insert(UserRole::User);
        Roles(set)
    }

    pub fn contains(&self, role: UserRole) -> bool {
        self.0.contains(&role)
    }

    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|r| r.as_str().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserRole> {
        self.0.iter()
    }

    /// Comma separated form used by the `users.roles` column.
    pub fn to_column(&self) -> String {
        self.names().join(",")
    }

    pub fn from_column(column: &str) -> Result<Self, UnknownRole> {
        let roles = column
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<UserRole>, _>>()?;
        Ok(Roles::new(roles))
    }
}

impl Default for Roles {
    fn default() -> Self {
        Roles::new([])
    }
}

impl From<BTreeSet<UserRole>> for Roles {
    fn from(set: BTreeSet<UserRole>) -> Self {
        Roles::new(set)
    }
}

impl From<Roles> for BTreeSet<UserRole> {
    fn from(roles: Roles) -> Self {
        roles.0
    }
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub roles: Roles,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub roles: Roles,
}

/// Principal rebuilt from access token claims, without a database hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub roles: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_always_include_user() {
        let roles = Roles::new([UserRole::Admin]);
        assert!(roles.contains(UserRole::User));
        assert!(roles.contains(UserRole::Admin));
        assert_eq!(roles.to_column(), "USER,ADMIN");
    }

    #[test]
    fn roles_column_parsing_rejects_unknown_names() {
        let roles = Roles::from_column("ADMIN, MODERATOR").unwrap();
        assert_eq!(roles.names(), vec!["USER", "MODERATOR", "ADMIN"]);
        assert!(Roles::from_column("ADMIN,ROOT").is_err());
        assert_eq!(Roles::from_column("").unwrap(), Roles::default());
    }
}
