//! OpenAPI schema definitions for the response envelopes.
//!
//! Handlers build envelopes from generic or borrowed types that utoipa
//! cannot describe directly. These wrappers mirror the wire shape so the
//! generated document matches what clients receive.

use utoipa::ToSchema;

use crate::domain::Error;

/// Failure envelope written for every error response.
#[derive(ToSchema)]
#[schema(as = FailureEnvelope)]
#[expect(
    dead_code,
    reason = "Used only for OpenAPI schema generation via utoipa"
)]
pub struct FailureEnvelopeSchema {
    #[schema(example = false)]
    success: bool,
    /// Same text as `error.message`.
    #[schema(example = "Document not found")]
    message: String,
    error: Error,
}

/// Success envelope; `data` depends on the operation.
#[derive(ToSchema)]
#[schema(as = SuccessEnvelope)]
#[expect(
    dead_code,
    reason = "Used only for OpenAPI schema generation via utoipa"
)]
pub struct SuccessEnvelopeSchema {
    #[schema(example = true)]
    success: bool,
    #[schema(example = "Success")]
    message: String,
    data: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use utoipa::PartialSchema;

    fn schema_to_json<T: PartialSchema>() -> String {
        serde_json::to_string(&T::schema()).expect("schema serialises to JSON")
    }

    #[test]
    fn failure_envelope_references_the_error_schema() {
        let schema_json = schema_to_json::<FailureEnvelopeSchema>();
        assert_eq!(FailureEnvelopeSchema::name(), "FailureEnvelope");
        assert!(schema_json.contains("Error"), "error member should reference Error");
    }

    #[test]
    fn error_schema_uses_camel_case() {
        let schema_json = schema_to_json::<Error>();
        assert!(schema_json.contains("traceId"), "schema should expose traceId");
    }

    #[test]
    fn error_code_schema_lists_quota_codes() {
        let schema_json = schema_to_json::<ErrorCode>();
        for code in [
            "limit_reached_auth",
            "limit_reached_db",
            "limit_reached_storage",
            "limit_reached_api",
        ] {
            assert!(schema_json.contains(code), "missing {code}");
        }
    }
}
