//! Shared validation helpers for inbound HTTP adapters.
//!
//! Every helper turns a raw path, query or header value into a domain type
//! or an `invalid_request` error whose `details` name the offending field.

use actix_web::HttpRequest;
use actix_web::http::header::IF_MATCH;
use serde_json::json;
use uuid::Uuid;

use crate::domain::{
    ChannelName, CollectionName, DocumentId, Error, FieldPath, OrderBy,
};

/// Validation error codes for HTTP request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    MissingField,
    InvalidUuid,
    InvalidName,
    InvalidField,
    InvalidOrder,
}

impl ErrorCode {
    fn as_str(self) -> &'static str {
        match self {
            ErrorCode::MissingField => "missing_field",
            ErrorCode::InvalidUuid => "invalid_uuid",
            ErrorCode::InvalidName => "invalid_name",
            ErrorCode::InvalidField => "invalid_field",
            ErrorCode::InvalidOrder => "invalid_order",
        }
    }
}

/// Newtype wrapper for HTTP field names to provide type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldName(&'static str);

impl FieldName {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self(name)
    }

    fn as_str(&self) -> &str {
        self.0
    }
}

fn field_error(field: FieldName, code: ErrorCode, message: String, value: &str) -> Error {
    Error::invalid_request(message).with_details(json!({
        "field": field.as_str(),
        "value": value,
        "code": code.as_str(),
    }))
}

pub(crate) fn missing_field_error(field: FieldName) -> Error {
    let name = field.as_str();
    Error::invalid_request(format!("missing required field: {name}")).with_details(json!({
        "field": name,
        "code": ErrorCode::MissingField.as_str(),
    }))
}

pub(crate) fn parse_uuid(value: &str, field: FieldName) -> Result<Uuid, Error> {
    Uuid::parse_str(value).map_err(|_| {
        field_error(
            field,
            ErrorCode::InvalidUuid,
            format!("{} must be a valid UUID", field.as_str()),
            value,
        )
    })
}

pub(crate) fn parse_document_id(value: &str) -> Result<DocumentId, Error> {
    parse_uuid(value, FieldName::new("id")).map(DocumentId::from_uuid)
}

pub(crate) fn parse_collection_name(value: &str, field: FieldName) -> Result<CollectionName, Error> {
    CollectionName::new(value)
        .map_err(|err| field_error(field, ErrorCode::InvalidName, err.to_string(), value))
}

pub(crate) fn parse_channel_name(value: &str, field: FieldName) -> Result<ChannelName, Error> {
    ChannelName::new(value)
        .map_err(|err| field_error(field, ErrorCode::InvalidName, err.to_string(), value))
}

pub(crate) fn parse_field_path(value: &str, field: FieldName) -> Result<FieldPath, Error> {
    FieldPath::new(value)
        .map_err(|err| field_error(field, ErrorCode::InvalidField, err.to_string(), value))
}

pub(crate) fn parse_select(values: &[String]) -> Result<Vec<FieldPath>, Error> {
    values
        .iter()
        .map(|value| parse_field_path(value, FieldName::new("select")))
        .collect()
}

/// Parse an `order_by` clause; absent or blank means newest first.
pub(crate) fn parse_order_by(value: Option<&str>) -> Result<OrderBy, Error> {
    match value.map(str::trim).filter(|raw| !raw.is_empty()) {
        None => Ok(OrderBy::default()),
        Some(raw) => raw.parse().map_err(|err: crate::domain::QueryValidationError| {
            field_error(
                FieldName::new("order_by"),
                ErrorCode::InvalidOrder,
                err.to_string(),
                raw,
            )
        }),
    }
}

/// Extract the concurrency token from `If-Match`.
///
/// Quotes and a weak `W/` prefix are stripped. A missing header, `*`, an
/// empty token or the literal `null` all mean the write is unconditional.
pub(crate) fn if_match(req: &HttpRequest) -> Option<String> {
    let raw = req.headers().get(IF_MATCH)?.to_str().ok()?.trim();
    let token = raw.strip_prefix("W/").unwrap_or(raw).trim_matches('"').trim();
    match token {
        "" | "*" | "null" => None,
        other => Some(other.to_owned()),
    }
}
