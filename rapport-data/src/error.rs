use thiserror::Error;

/// Sign-in and registration failures, subdivided by provider-reported cause.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("this email address is already in use")]
    EmailInUse,

    #[error("password must be at least 6 characters")]
    WeakPassword,

    #[error("invalid email address")]
    InvalidEmail,

    #[error("this account has been disabled")]
    AccountDisabled,

    #[error("too many attempts, try again later")]
    RateLimited,

    #[error("network error, check your connection")]
    Network,

    #[error("{0}")]
    Other(String),
}

impl AuthError {
    /// Map a provider error code (`auth/...`) to a typed cause.
    pub fn from_code(code: &str) -> Self {
        match code {
            "auth/email-already-in-use" => AuthError::EmailInUse,
            "auth/invalid-email" => AuthError::InvalidEmail,
            "auth/weak-password" => AuthError::WeakPassword,
            "auth/user-not-found" | "auth/wrong-password" | "auth/invalid-credential" => {
                AuthError::InvalidCredentials
            }
            "auth/user-disabled" => AuthError::AccountDisabled,
            "auth/too-many-requests" => AuthError::RateLimited,
            "auth/network-request-failed" => AuthError::Network,
            other => AuthError::Other(other.to_string()),
        }
    }
}

/// Error types for store and service operations.
/// Used by all three crates; the web layer maps each variant to a status code.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("invalid data: {0}")]
    Validation(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("{what} '{id}' not found")]
    NotFound { what: &'static str, id: String },

    #[error("report '{0}' is validated and locked for editing")]
    EditForbidden(String),

    #[error("{what} '{name}' is referenced by existing reports")]
    ResourceInUse { what: &'static str, name: String },

    #[error("backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl DataError {
    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        DataError::NotFound {
            what,
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_maps_provider_codes() {
        assert_eq!(
            AuthError::from_code("auth/wrong-password"),
            AuthError::InvalidCredentials
        );
        assert_eq!(
            AuthError::from_code("auth/user-not-found"),
            AuthError::InvalidCredentials
        );
        assert_eq!(
            AuthError::from_code("auth/too-many-requests"),
            AuthError::RateLimited
        );
        assert_eq!(
            AuthError::from_code("auth/network-request-failed"),
            AuthError::Network
        );
        assert_eq!(
            AuthError::from_code("auth/something-new"),
            AuthError::Other("auth/something-new".to_string())
        );
    }

    #[test]
    fn data_error_messages() {
        let err = DataError::not_found("report", "r-42");
        assert_eq!(err.to_string(), "report 'r-42' not found");

        let err = DataError::EditForbidden("r-1".to_string());
        assert!(err.to_string().contains("locked for editing"));

        let err = DataError::ResourceInUse {
            what: "client",
            name: "Acme".to_string(),
        };
        assert!(err.to_string().contains("referenced by existing reports"));
    }
}
