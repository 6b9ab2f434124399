// Error handling types for the dashboard core

use tracing::error;

use super::validation::ValidationResult;

/// Core error types
///
/// Every fallible operation of the session and table services returns one of
/// these. Formatting never does: display fallbacks are absorbed locally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid registration data")]
    InvalidRegistration,

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Validation Error: {0}")]
    Validation(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl CoreError {
    /// Stable machine-readable code, mirrored in notifications and logs
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidCredentials => "INVALID_CREDENTIALS",
            CoreError::InvalidRegistration => "INVALID_REGISTRATION",
            CoreError::InvalidSchema(_) => "INVALID_SCHEMA",
            CoreError::Validation(_) => "VALIDATION_ERROR",
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::Transport(_) => "TRANSPORT_FAILURE",
            CoreError::Unauthorized(_) => "UNAUTHORIZED",
            CoreError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// True for every error reported before any mutation took place
    /// because the caller's input was rejected.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidCredentials
                | CoreError::InvalidRegistration
                | CoreError::InvalidSchema(_)
                | CoreError::Validation(_)
        )
    }

    /// Log the error with its code at error level and hand it back
    pub fn logged(self) -> Self {
        error!(code = self.code(), error = %self, "Operation failed");
        self
    }
}

/// Helper function to convert ValidationResult to CoreError
impl From<ValidationResult> for CoreError {
    fn from(result: ValidationResult) -> Self {
        if result.is_valid {
            CoreError::Validation(
                "Validation result was valid but converted to error".to_string(),
            )
        } else {
            CoreError::Validation(result.summary())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_result_conversion() {
        let mut result = ValidationResult::new();
        result.add_error("name", "Column name is required");
        result.add_error("source_locator", "Spreadsheet URL is required");

        let err = CoreError::from(result);
        assert_eq!(
            err,
            CoreError::Validation(
                "name: Column name is required, source_locator: Spreadsheet URL is required"
                    .to_string()
            )
        );
        assert!(err.is_validation());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(CoreError::NotFound("T_1".into()).code(), "NOT_FOUND");
        assert_eq!(CoreError::Transport("down".into()).code(), "TRANSPORT_FAILURE");
        assert!(!CoreError::NotFound("T_1".into()).is_validation());
        assert!(CoreError::InvalidCredentials.is_validation());
        assert!(CoreError::InvalidSchema("empty".into()).is_validation());
    }
}
