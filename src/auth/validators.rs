use super::models::{LoginRequest, RegisterRequest};
use crate::common::{ValidationResult, Validator};

// Only emptiness is checked here; anything else is up to the auth provider.

impl Validator<LoginRequest> for LoginRequest {
    fn validate(&self, data: &LoginRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        if data.email.is_empty() {
            result.add_error("email", "Email is required");
        }

        if data.password.is_empty() {
            result.add_error("password", "Password is required");
        }

        result
    }
}

impl Validator<RegisterRequest> for RegisterRequest {
    fn validate(&self, data: &RegisterRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        if data.email.is_empty() {
            result.add_error("email", "Email is required");
        }

        if data.password.is_empty() {
            result.add_error("password", "Password is required");
        }

        if data.name.is_empty() {
            result.add_error("name", "Name is required");
        }

        result
    }
}
