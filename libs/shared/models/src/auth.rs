use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }

    pub fn is_staff(&self) -> bool {
        matches!(self.role.as_deref(), Some("admin") | Some("doctor") | Some("receptionist"))
    }
}

/// Who performs a scheduling operation. Passed explicitly into every
/// booking, transition and schedule write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActingUser {
    pub id: String,
    pub role: Option<String>,
}

impl ActingUser {
    pub fn new(id: impl Into<String>, role: Option<&str>) -> Self {
        Self {
            id: id.into(),
            role: role.map(str::to_string),
        }
    }

    pub fn system() -> Self {
        Self::new("system", Some("system"))
    }
}

impl From<&User> for ActingUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            role: user.role.clone(),
        }
    }
}

impl fmt::Display for ActingUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.role {
            Some(role) => write!(f, "{} ({})", self.id, role),
            None => write!(f, "{}", self.id),
        }
    }
}
