//! Field-scoped input validation.
//!
//! Errors are collected per field and reported as `field -> [messages]`,
//! never as one opaque string.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use validator::{Validate, ValidationErrors};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: &str) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = FieldErrors::new();
        for (field, list) in errors.field_errors() {
            for error in list.iter() {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.code.to_string());
                out.push(&field, message);
            }
        }
        out
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// Signup record. Credentials are handled upstream.
#[derive(Debug, Clone, Validate, Deserialize)]
pub struct NewUser {
    #[validate(length(min = 3, message = "Username is too short"))]
    pub username: String,
    #[validate(email(message = "Email is not valid"))]
    pub email: String,
    #[validate(url(message = "Profile picture must be a URL"))]
    pub profile_picture: Option<String>,
}

impl NewUser {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            profile_picture: None,
        }
    }

    /// Trim and validate, collecting every field failure.
    pub fn normalized(self) -> Result<Self, FieldErrors> {
        let req = Self {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            profile_picture: self.profile_picture.map(|p| p.trim().to_string()),
        };
        req.validate()?;
        Ok(req)
    }
}

/// Partial profile edit; absent fields keep their current value.
#[derive(Debug, Clone, Default, Validate, Deserialize)]
pub struct ProfileUpdate {
    #[validate(length(min = 3, message = "Username is too short"))]
    pub username: Option<String>,
    #[validate(email(message = "Email is not valid"))]
    pub email: Option<String>,
    #[validate(url(message = "Profile picture must be a URL"))]
    pub profile_picture: Option<String>,
}

impl ProfileUpdate {
    pub fn normalized(self) -> Result<Self, FieldErrors> {
        let req = Self {
            username: self.username.map(|u| u.trim().to_string()),
            email: self.email.map(|e| e.trim().to_lowercase()),
            profile_picture: self.profile_picture.map(|p| p.trim().to_string()),
        };
        req.validate()?;
        Ok(req)
    }
}

#[derive(Debug, Clone, Validate, Deserialize)]
pub struct NewComment {
    #[validate(length(min = 1, message = "Comment is empty"))]
    pub text: String,
}

impl NewComment {
    pub fn normalized(text: &str) -> Result<Self, FieldErrors> {
        let req = Self {
            text: text.trim().to_string(),
        };
        req.validate()?;
        Ok(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_collects_every_field() {
        let err = NewUser::new("ab", "nope").normalized().unwrap_err();
        assert_eq!(err.messages("username"), ["Username is too short"]);
        assert_eq!(err.messages("email"), ["Email is not valid"]);
    }

    #[test]
    fn test_new_user_trims_and_lowercases() {
        let req = NewUser::new("  carol  ", " Carol@Example.COM ")
            .normalized()
            .unwrap();
        assert_eq!(req.username, "carol");
        assert_eq!(req.email, "carol@example.com");
    }

    #[test]
    fn test_blank_comment_rejected() {
        let err = NewComment::normalized("   ").unwrap_err();
        assert_eq!(err.messages("text"), ["Comment is empty"]);
    }

    #[test]
    fn test_profile_update_allows_absent_fields() {
        assert!(ProfileUpdate::default().normalized().is_ok());
        let err = ProfileUpdate {
            profile_picture: Some("not a url".into()),
            ..Default::default()
        }
        .normalized()
        .unwrap_err();
        assert_eq!(err.fields().collect::<Vec<_>>(), ["profile_picture"]);
    }

    #[test]
    fn test_field_errors_display() {
        let mut errors = FieldErrors::new();
        errors.push("a", "x");
        errors.push("a", "y");
        assert_eq!(errors.to_string(), "a: x, y");
        assert!(FieldErrors::new().into_result().is_ok());
    }
}
