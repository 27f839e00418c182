use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Account verification state, stored as `SMALLINT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Unverified = 0,
    Verified = 1,
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub fullname: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,             // Argon2 hash, not exposed in JSON
    pub status: UserStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
}

/// A user being edited: either not yet saved (`id == None`) or loaded.
#[derive(Debug, Clone)]
pub struct UserDraft {
    pub id: Option<i64>,
    pub fullname: String,
    pub email: String,
    pub password: String,
    pub status: UserStatus,
}

impl UserDraft {
    pub fn new_unverified() -> Self {
        Self {
            id: None,
            fullname: String::new(),
            email: String::new(),
            password: String::new(),
            status: UserStatus::Unverified,
        }
    }

    pub fn snapshot(&self) -> UserSnapshot {
        UserSnapshot {
            id: self.id,
            fullname: self.fullname.clone(),
            email: self.email.clone(),
            status: self.status,
        }
    }
}

impl From<User> for UserDraft {
    fn from(u: User) -> Self {
        Self {
            id: Some(u.id),
            fullname: u.fullname,
            email: u.email,
            password: u.password,
            status: u.status,
        }
    }
}

/// Password-free view of a user carried by lifecycle events and views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub id: Option<i64>,
    pub fullname: String,
    pub email: String,
    pub status: UserStatus,
}

impl From<&User> for UserSnapshot {
    fn from(u: &User) -> Self {
        Self {
            id: Some(u.id),
            fullname: u.fullname.clone(),
            email: u.email.clone(),
            status: u.status,
        }
    }
}

/// A listed user together with the roles it holds.
#[derive(Debug, Clone, Serialize)]
pub struct UserWithRoles {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<Role>,
}

/// Listing criteria. Empty fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub keyword: String,
    pub role_ids: Vec<i64>,
}

/// One page of results plus pagination metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub last_page: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, page: i64, per_page: i64) -> Self {
        let last_page = ((total + per_page - 1) / per_page).max(1);
        Self {
            items,
            total,
            page,
            per_page,
            last_page,
        }
    }
}
