use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::AppError;
use crate::flash::FieldErrors;
use crate::users::repo_types::{Role, UserStatus};

/// Which rule set a submission is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Create,
    Update,
}

impl Profile {
    pub fn as_str(self) -> &'static str {
        match self {
            Profile::Create => "create",
            Profile::Update => "update",
        }
    }
}

/// Request body for `POST /users` and `PUT /users/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UserInput {
    /// Echo of the path id, required on update.
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    #[validate(length(max = 100, message = "The full name may not exceed 100 characters."))]
    pub fullname: String,
    #[serde(default)]
    #[validate(email(message = "The e-mail address must be valid."))]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 128, message = "The password may not exceed 128 characters."))]
    pub password: Option<String>,
    #[serde(default)]
    pub roles: Vec<i64>,
}

impl UserInput {
    /// Check the submission against `profile`'s rules.
    pub fn validate_for(&self, profile: Profile) -> Result<(), ValidationErrors> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(e) => e,
        };
        if self.fullname.trim().is_empty() {
            let mut err = ValidationError::new("required");
            err.message = Some(Cow::Borrowed("The full name is required."));
            errors.add("fullname", err);
        }
        if profile == Profile::Create && !self.has_password() {
            let mut err = ValidationError::new("required");
            err.message = Some(Cow::Borrowed("The password is required."));
            errors.add("password", err);
        }
        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn has_password(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Copy suitable for flashing back into a form: the password is dropped.
    pub fn without_password(&self) -> Self {
        Self {
            password: None,
            ..self.clone()
        }
    }

    /// Submitted role ids with duplicates removed, in submission order.
    pub fn role_ids(&self) -> Vec<i64> {
        let mut seen = Vec::with_capacity(self.roles.len());
        for id in &self.roles {
            if !seen.contains(id) {
                seen.push(*id);
            }
        }
        seen
    }
}

/// Flatten validator errors into field → messages.
pub fn field_errors(errors: &ValidationErrors) -> FieldErrors {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

/// Highest listing page served; larger requests get this (empty) page.
pub const MAX_PAGE: i64 = 1_000_000;

/// Query string of `GET /users`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub q: String,
    /// Comma-separated role ids.
    #[serde(default)]
    pub roles: String,
    #[serde(default = "default_page")]
    pub page: i64,
}

fn default_page() -> i64 {
    1
}

impl ListQuery {
    pub fn page(&self) -> i64 {
        self.page.clamp(1, MAX_PAGE)
    }

    pub fn role_ids(&self) -> Result<Vec<i64>, AppError> {
        self.roles
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<i64>()
                    .map_err(|_| AppError::BadRequest(format!("invalid role id: {}", s)))
            })
            .collect()
    }
}

/// The user a form is editing.
#[derive(Debug, Clone, Serialize)]
pub struct EditedUser {
    pub id: Option<i64>,
    pub fullname: String,
    pub email: String,
    pub status: UserStatus,
    pub roles: Vec<Role>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> UserInput {
        UserInput {
            id: None,
            fullname: "Ada".into(),
            email: "a@x.com".into(),
            password: Some("p".into()),
            roles: vec![2, 3],
        }
    }

    #[test]
    fn create_requires_password() {
        let mut i = input();
        i.password = Some(String::new());
        let errors = field_errors(&i.validate_for(Profile::Create).unwrap_err());
        assert_eq!(errors["password"], vec!["The password is required.".to_string()]);
    }

    #[test]
    fn update_allows_empty_password() {
        let mut i = input();
        i.password = None;
        assert!(i.validate_for(Profile::Update).is_ok());
    }

    #[test]
    fn email_and_fullname_are_checked_on_both_profiles() {
        let i = UserInput {
            fullname: String::new(),
            email: "not-an-email".into(),
            ..input()
        };
        for profile in [Profile::Create, Profile::Update] {
            let errors = field_errors(&i.validate_for(profile).unwrap_err());
            assert!(errors.contains_key("fullname"));
            assert!(errors.contains_key("email"));
        }
    }

    #[test]
    fn fullname_messages_distinguish_missing_from_too_long() {
        let blank = UserInput {
            fullname: "   ".into(),
            ..input()
        };
        let errors = field_errors(&blank.validate_for(Profile::Update).unwrap_err());
        assert_eq!(errors["fullname"], vec!["The full name is required.".to_string()]);

        let long = UserInput {
            fullname: "a".repeat(101),
            ..input()
        };
        let errors = field_errors(&long.validate_for(Profile::Update).unwrap_err());
        assert_eq!(
            errors["fullname"],
            vec!["The full name may not exceed 100 characters.".to_string()]
        );
    }

    #[test]
    fn page_is_kept_within_bounds() {
        let query = |page| ListQuery {
            page,
            ..Default::default()
        };
        assert_eq!(query(0).page(), 1);
        assert_eq!(query(-4).page(), 1);
        assert_eq!(query(7).page(), 7);
        assert_eq!(query(i64::MAX).page(), MAX_PAGE);
    }

    #[test]
    fn role_ids_are_deduplicated() {
        let i = UserInput {
            roles: vec![3, 2, 3],
            ..input()
        };
        assert_eq!(i.role_ids(), vec![3, 2]);
    }

    #[test]
    fn list_query_parses_role_filter() {
        let q = ListQuery {
            roles: "1, 2,".into(),
            ..Default::default()
        };
        assert_eq!(q.role_ids().unwrap(), vec![1, 2]);

        let bad = ListQuery {
            roles: "x".into(),
            ..Default::default()
        };
        assert!(matches!(bad.role_ids(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn flashed_input_drops_password() {
        assert!(input().without_password().password.is_none());
    }
}
