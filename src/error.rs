use serde::Serialize;

// ============================================================================
// Domain Error Taxonomy
// ============================================================================
//
// Every failure a caller can act on falls into one of four kinds:
// - Validation:   malformed or missing input, invalid status value
// - NotFound:     order / item / product / store / courier missing
// - Conflict:     already assigned, already validated, promotion exhausted
// - AccessDenied: wrong role, wrong store, wrong courier
//
// Infrastructure failures stay in anyhow and surface as a generic 500.
//
// ============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum DomainError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    AccessDenied(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn access_denied(msg: impl Into<String>) -> Self {
        Self::AccessDenied(msg.into())
    }

    /// HTTP status code for the response envelope
    pub fn http_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::AccessDenied(_) => 403,
        }
    }

    /// Machine-readable failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::AccessDenied(_) => "access_denied",
        }
    }

    pub fn to_envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            code: self.http_code(),
            status: self.kind().to_string(),
            message: self.to_string(),
        }
    }
}

/// Wire shape for domain failures: `{code, status, message}`
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub code: u16,
    pub status: String,
    pub message: String,
}

impl ErrorEnvelope {
    /// Envelope for unhandled failures; internals are not leaked.
    pub fn internal() -> Self {
        Self {
            code: 500,
            status: "internal_error".to_string(),
            message: "Internal server error".to_string(),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_map_to_http_codes() {
        assert_eq!(DomainError::validation("bad input").http_code(), 400);
        assert_eq!(DomainError::not_found("no such order").http_code(), 404);
        assert_eq!(DomainError::conflict("already assigned").http_code(), 409);
        assert_eq!(DomainError::access_denied("wrong store").http_code(), 403);
    }

    #[test]
    fn test_envelope_shape() {
        let envelope = DomainError::conflict("Order already assigned").to_envelope();
        assert_eq!(envelope.code, 409);
        assert_eq!(envelope.status, "conflict");
        assert_eq!(envelope.message, "Order already assigned");

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["code"], 409);
        assert_eq!(json["status"], "conflict");
    }

    #[test]
    fn test_internal_envelope_hides_details() {
        let envelope = ErrorEnvelope::internal();
        assert_eq!(envelope.code, 500);
        assert_eq!(envelope.message, "Internal server error");
    }
}
