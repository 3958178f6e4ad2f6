//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`MiniCamError`]
//! via `#[from]` or an explicit `into_domain`.

use crate::capability::Capability;
use crate::id::NativeId;

/// Boxed error used for failures raised by external collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error returned by every operation of the provider.
#[derive(Debug, thiserror::Error)]
pub enum MiniCamError {
    /// Malformed identifier, setting or descriptor.
    #[error("invalid argument")]
    InvalidArgument(#[from] ValidationError),

    /// Unknown device or session.
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// The device exists but lacks the capability the operation needs.
    #[error("device {native_id} does not support {capability}")]
    UnsupportedCapability {
        native_id: NativeId,
        capability: Capability,
    },

    /// A concurrency cap was reached.
    #[error("device {native_id} already has {limit} active streams")]
    ResourceExhausted { native_id: NativeId, limit: usize },

    /// An exclusive session is already held for this device.
    #[error("device {native_id} already has an intercom session")]
    SessionConflict { native_id: NativeId },

    /// The upstream account or API could not be used.
    #[error("upstream source unavailable")]
    UpstreamUnavailable(#[from] UpstreamError),

    /// The media transport failed while negotiating or running a session.
    #[error("media transport error")]
    Transport(#[source] BoxError),

    /// The session was closed while its transport was still negotiating.
    #[error("stream session was cancelled")]
    Cancelled,

    /// The second-factor code arrived after the challenge expired.
    #[error("login challenge expired, enter the credentials again")]
    ChallengeExpired,

    /// Another login flow is already in flight for this account.
    #[error("a login is already in progress")]
    OperationInProgress,

    /// The upstream rejected the supplied credentials or code.
    #[error("login failed: {reason}")]
    LoginFailed { reason: String },

    /// The upstream rejected an established session.
    #[error("upstream rejected the session credentials")]
    AuthRejected,
}

impl MiniCamError {
    /// Wrap a transport-level failure.
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(err.into())
    }

    /// Whether the user has to re-enter credentials to recover.
    #[must_use]
    pub fn requires_credentials(&self) -> bool {
        matches!(
            self,
            Self::ChallengeExpired | Self::LoginFailed { .. } | Self::AuthRejected
        )
    }

    /// Whether retrying the same call later may succeed without user input.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::UpstreamUnavailable(UpstreamError::NotLoggedIn) => false,
            Self::UpstreamUnavailable(_)
            | Self::Transport(_)
            | Self::Cancelled
            | Self::OperationInProgress
            | Self::ResourceExhausted { .. }
            | Self::SessionConflict { .. } => true,
            _ => false,
        }
    }

    /// Human-readable message suitable for a user alert.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::LoginFailed { reason } => {
                format!("Login failed ({reason}). Is your email and password correct?")
            }
            Self::AuthRejected => {
                "The session was rejected. Re-enter your email and password.".to_string()
            }
            Self::ChallengeExpired => {
                "The two factor code expired. Save your password again to request a new code."
                    .to_string()
            }
            Self::UpstreamUnavailable(UpstreamError::NotLoggedIn) => {
                "Not logged in. Enter your email and password.".to_string()
            }
            other if other.is_retryable() => format!("{other}. Try again shortly."),
            other => other.to_string(),
        }
    }
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("native id must not be empty")]
    EmptyNativeId,

    #[error("name must not be empty")]
    EmptyName,

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("unknown setting {0:?}")]
    UnknownSetting(String),

    #[error("no login challenge is pending")]
    NoPendingChallenge,

    #[error("media descriptor has no input arguments")]
    EmptyMediaDescriptor,

    #[error("invalid media descriptor")]
    MalformedMediaDescriptor,
}

/// An entity lookup came back empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// Why the upstream source could not be used.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// No session is established (logged out or waiting for a challenge).
    #[error("account is not logged in")]
    NotLoggedIn,

    /// The upstream did not answer in time.
    #[error("upstream request timed out")]
    Timeout,

    /// The upstream request failed.
    #[error("upstream request failed")]
    Request(#[source] BoxError),
}
