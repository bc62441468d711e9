/// Error types for sphere-service
use thiserror::Error;

use crate::domain::FieldErrors;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict on `{field}`: {message}")]
    Conflict { field: String, message: String },

    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl ServiceError {
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        ServiceError::NotFound(format!("{} {} does not exist", kind, id))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound(_))
    }

    /// Stable machine-readable code for logs and the request layer.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Conflict { .. } => "conflict",
            ServiceError::Validation(_) => "validation_error",
            ServiceError::InvalidArgument(_) => "invalid_argument",
            ServiceError::Forbidden(_) => "forbidden",
            ServiceError::IntegrityViolation(_) => "integrity_violation",
            ServiceError::Store(_) => "store_error",
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { field } => {
                let message = match field.as_str() {
                    "username" => "Username already exists".to_string(),
                    "email" => "Email already in use".to_string(),
                    other => format!("{} already exists", other),
                };
                ServiceError::Conflict { field, message }
            }
            other => ServiceError::Store(other),
        }
    }
}

impl From<FieldErrors> for ServiceError {
    fn from(errors: FieldErrors) -> Self {
        ServiceError::Validation(errors)
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_conflict_maps_to_field_conflict() {
        let err: ServiceError = StoreError::Conflict {
            field: "username".into(),
        }
        .into();
        match err {
            ServiceError::Conflict { field, message } => {
                assert_eq!(field, "username");
                assert_eq!(message, "Username already exists");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_codes() {
        assert_eq!(ServiceError::not_found("post", 1).code(), "not_found");
        assert_eq!(
            ServiceError::Validation(FieldErrors::single("text", "Comment is empty")).code(),
            "validation_error"
        );
        assert_eq!(
            ServiceError::Store(StoreError::Unavailable("down".into())).code(),
            "store_error"
        );
    }
}
