//! Session gate for privileged operations

use tracing::{debug, warn};

use super::session::SessionManager;
use crate::common::{safe_email_log, CoreError};

/// Authenticated user extractor
///
/// Resolving one is the check every table operation performs first: it
/// succeeds only while the stored credential is valid, and an expired
/// credential is cleared as a side effect.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub id: String,
    pub email: String,
    pub name: String,
}

impl AuthedUser {
    pub async fn from_session(session: &SessionManager) -> Result<Self, CoreError> {
        match session.current_credential().await {
            Some(credential) => {
                debug!(
                    user_id = %credential.subject_id,
                    email = %safe_email_log(&credential.email),
                    "Session check passed"
                );
                Ok(AuthedUser {
                    id: credential.subject_id,
                    email: credential.email,
                    name: credential.display_name,
                })
            }
            None => {
                warn!("Session check failed: no valid credential");
                Err(CoreError::Unauthorized(
                    "session missing or expired".into(),
                ))
            }
        }
    }
}
