//! Error types for hotswap-accounts.

use std::fmt;

/// Result type alias for hotswap-accounts operations.
pub type Result<T> = std::result::Result<T, AccountError>;

/// Errors that can occur when loading, reloading, or resolving accounts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    /// One account's settings failed factory validation.
    ///
    /// Contained within a reload: the account is skipped and the rest load.
    #[error("Invalid configuration for account '{account}': {source}")]
    InvalidAccountConfig {
        /// Name of the rejected account
        account: String,
        /// What the factory rejected
        #[source]
        source: ValidationError,
    },

    /// An explicitly requested account does not exist.
    #[error("Account '{name}' not found")]
    AccountNotFound {
        /// The requested account name
        name: String,
    },

    /// No account name was requested and no default account is configured.
    #[error("No account name given and no default account is configured")]
    NoDefaultAccountConfigured,

    /// The configured default account does not exist in the current account set.
    #[error("Default account '{name}' is configured but does not exist")]
    DefaultAccountMissing {
        /// The configured default account name
        name: String,
    },

    /// The snapshot as a whole could not be interpreted.
    #[error("Malformed settings snapshot: {0}")]
    MalformedSnapshot(String),

    /// Failed to load settings from a source.
    #[error("Failed to load settings: {0}")]
    LoadError(String),

    /// Failed to parse a settings file.
    #[error("Failed to parse settings: {0}")]
    ParseError(String),

    /// File watching is not supported or failed to initialize.
    #[error("File watching error: {0}")]
    WatchError(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    IoError(String),
}

impl AccountError {
    /// Wrap a factory validation failure with the name of the offending account.
    pub fn invalid_account(account: impl Into<String>, source: ValidationError) -> Self {
        Self::InvalidAccountConfig {
            account: account.into(),
            source,
        }
    }

    /// Whether this error describes a configuration problem rather than a bad request.
    ///
    /// Callers translating resolve failures into user-facing responses use this to
    /// tell "you asked for something that doesn't exist" apart from "the service is
    /// misconfigured".
    pub fn is_configuration_error(&self) -> bool {
        !matches!(self, Self::AccountNotFound { .. })
    }
}

impl From<std::io::Error> for AccountError {
    fn from(err: std::io::Error) -> Self {
        AccountError::IoError(err.to_string())
    }
}

/// Validation failure reported by an account factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is absent.
    MissingField {
        /// The field name, relative to the account
        field: String,
    },

    /// A field is present but its value is unusable.
    InvalidField {
        /// The field name, relative to the account
        field: String,
        /// The reason why it's invalid
        reason: String,
    },

    /// Two mutually exclusive fields are both set.
    ConflictingFields {
        /// The field that was reported first
        field: String,
        /// The field it conflicts with
        other: String,
    },

    /// Custom validation error with a message.
    Custom(String),
}

impl ValidationError {
    /// Create a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a conflicting fields error.
    pub fn conflicting_fields(field: impl Into<String>, other: impl Into<String>) -> Self {
        Self::ConflictingFields {
            field: field.into(),
            other: other.into(),
        }
    }

    /// Create a custom validation error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// The offending field, if the failure is tied to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField { field }
            | Self::InvalidField { field, .. }
            | Self::ConflictingFields { field, .. } => Some(field),
            Self::Custom(_) => None,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { field } => write!(f, "Field '{}' is required", field),
            Self::InvalidField { field, reason } => {
                write!(f, "Field '{}' is invalid: {}", field, reason)
            }
            Self::ConflictingFields { field, other } => {
                write!(f, "Fields '{}' and '{}' cannot both be set", field, other)
            }
            Self::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}
