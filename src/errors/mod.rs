use axum::http::StatusCode;
use thiserror::Error;

/// Maximum length of a backend detail string surfaced to users and owners.
pub const MAX_DETAIL_CHARS: usize = 1024;

/// Typed error hierarchy for wahub.
///
/// Use at component boundaries (ingress, tenant lookup, external collaborators,
/// session commits). Internal/leaf functions can keep using `anyhow::Result`;
/// the `Internal` variant converts via `?`.
#[derive(Debug, Error)]
pub enum WahubError {
    #[error("Missing webhook signature")]
    MissingSignature,

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Envelope carries no business phone number id")]
    MissingPhoneNumberId,

    #[error("Unknown tenant for phone number id {0}")]
    UnknownTenant(String),

    #[error("Webhook verification failed")]
    UnauthorizedVerification,

    #[error("Tenant not configured: {0}")]
    TenantNotConfigured(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{service} unavailable: {message}")]
    Transient { service: String, message: String },

    #[error("Rate limit exceeded")]
    RateLimit { retry_after: Option<u64> },

    #[error("{service} rejected the request ({status}): {detail}")]
    Permanent {
        service: String,
        status: u16,
        detail: String,
    },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Coarse error classes used for propagation decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Ingress,
    Config,
    TransientExternal,
    PermanentExternal,
    Internal,
}

impl WahubError {
    pub fn transient(service: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Transient {
            service: service.into(),
            message: message.to_string(),
        }
    }

    /// Build a permanent rejection, truncating the backend detail.
    pub fn permanent(service: impl Into<String>, status: u16, detail: &str) -> Self {
        Self::Permanent {
            service: service.into(),
            status,
            detail: truncate_detail(detail),
        }
    }

    /// Classify a failed HTTP response from an external collaborator: 429 and
    /// 5xx are transient, 401/403 are credential problems, other 4xx are
    /// permanent rejections.
    pub fn from_status(
        service: &str,
        status: u16,
        retry_after: Option<u64>,
        detail: &str,
    ) -> Self {
        match status {
            429 => Self::RateLimit { retry_after },
            401 | 403 => Self::Auth(format!(
                "{} rejected credentials: {}",
                service,
                truncate_detail(detail)
            )),
            s if s >= 500 => Self::transient(service, format!("HTTP {}: {}", s, truncate_detail(detail))),
            s => Self::permanent(service, s, detail),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingSignature
            | Self::InvalidSignature
            | Self::MalformedPayload(_)
            | Self::MissingPhoneNumberId
            | Self::UnknownTenant(_)
            | Self::UnauthorizedVerification => ErrorKind::Ingress,
            Self::TenantNotConfigured(_) | Self::Config(_) | Self::Auth(_) => ErrorKind::Config,
            Self::Transient { .. } | Self::RateLimit { .. } => ErrorKind::TransientExternal,
            Self::Permanent { .. } => ErrorKind::PermanentExternal,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether this error is transient and the operation should be retried.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::TransientExternal
    }

    /// HTTP status reported to the webhook caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingSignature | Self::InvalidSignature | Self::UnauthorizedVerification => {
                StatusCode::FORBIDDEN
            }
            Self::MalformedPayload(_) | Self::MissingPhoneNumberId => StatusCode::BAD_REQUEST,
            Self::UnknownTenant(_) => StatusCode::NOT_FOUND,
            Self::Transient { .. } | Self::RateLimit { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Permanent { .. } => StatusCode::BAD_GATEWAY,
            Self::TenantNotConfigured(_)
            | Self::Config(_)
            | Self::Auth(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Classify an `anyhow` chain: typed errors keep their kind, anything else is internal.
pub fn kind_of(err: &anyhow::Error) -> ErrorKind {
    err.downcast_ref::<WahubError>()
        .map_or(ErrorKind::Internal, WahubError::kind)
}

/// Truncate a backend detail string on a char boundary.
pub fn truncate_detail(detail: &str) -> String {
    let trimmed = detail.trim();
    if trimmed.chars().count() <= MAX_DETAIL_CHARS {
        return trimmed.to_string();
    }
    trimmed.chars().take(MAX_DETAIL_CHARS).collect()
}

#[cfg(test)]
mod tests;
