//! Structured document queries.
//!
//! Callers describe predicates as a list of `(field, op, value)` filters that
//! are ANDed together. Filters are validated here so adapters only ever see
//! well-formed trees; compiling them into SQL is the persistence adapter's job
//! and must bind both field names and values as parameters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::Payload;

/// Default page size when the caller does not supply a limit.
pub const DEFAULT_QUERY_LIMIT: i64 = 100;
/// Upper bound applied to caller-supplied limits.
pub const MAX_QUERY_LIMIT: i64 = 1000;
/// Maximum length of a payload field name.
pub const FIELD_NAME_MAX: usize = 255;

/// Validation failures for query input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValidationError {
    EmptyField,
    FieldTooLong { max: usize },
    FieldInvalidCharacters,
    ExpectedArray { op: FilterOp },
    ExpectedString { op: FilterOp },
    ExpectedNumber { op: FilterOp },
    UnknownOrderColumn(String),
    UnknownOrderDirection(String),
    NegativeOffset,
}

impl fmt::Display for QueryValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyField => write!(f, "field name must not be empty"),
            Self::FieldTooLong { max } => write!(f, "field name must be at most {max} characters"),
            Self::FieldInvalidCharacters => {
                write!(f, "field name must not contain control characters")
            }
            Self::ExpectedArray { op } => write!(f, "operator '{op}' expects an array value"),
            Self::ExpectedString { op } => write!(f, "operator '{op}' expects a string value"),
            Self::ExpectedNumber { op } => write!(f, "operator '{op}' expects a numeric value"),
            Self::UnknownOrderColumn(column) => write!(
                f,
                "cannot order by '{column}'; use created_at, updated_at or version"
            ),
            Self::UnknownOrderDirection(direction) => {
                write!(f, "order direction '{direction}' must be ASC or DESC")
            }
            Self::NegativeOffset => write!(f, "offset must not be negative"),
        }
    }
}

impl std::error::Error for QueryValidationError {}

/// Top-level payload field name used by filters, projections and increments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(value_type = String)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn new(field: impl Into<String>) -> Result<Self, QueryValidationError> {
        let field = field.into();
        if field.trim().is_empty() {
            return Err(QueryValidationError::EmptyField);
        }
        if field.chars().count() > FIELD_NAME_MAX {
            return Err(QueryValidationError::FieldTooLong {
                max: FIELD_NAME_MAX,
            });
        }
        if field.chars().any(char::is_control) {
            return Err(QueryValidationError::FieldInvalidCharacters);
        }
        Ok(Self(field))
    }
}

impl AsRef<str> for FieldPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<FieldPath> for String {
    fn from(value: FieldPath) -> Self {
        value.0
    }
}

impl TryFrom<String> for FieldPath {
    type Error = QueryValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Filter operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum FilterOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "startsWith")]
    StartsWith,
}

impl FilterOp {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::In => "in",
            Self::Contains => "contains",
            Self::StartsWith => "startsWith",
        }
    }

    /// Numeric comparison operators cast the stored field to a number.
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Gt | Self::Lt | Self::Gte | Self::Lte)
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize)]
struct RawFilter {
    field: String,
    op: FilterOp,
    #[serde(default)]
    value: Value,
}

/// One `(field, op, value)` predicate.
///
/// # Examples
/// ```
/// use backend::domain::{Filter, FilterOp};
/// use serde_json::json;
///
/// let filter: Filter = serde_json::from_value(json!({
///     "field": "views", "op": ">=", "value": 10
/// }))
/// .expect("valid filter");
/// assert_eq!(filter.op(), FilterOp::Gte);
///
/// let bad = serde_json::from_value::<Filter>(json!({
///     "field": "views", "op": ">=", "value": "ten"
/// }));
/// assert!(bad.is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "RawFilter")]
pub struct Filter {
    field: FieldPath,
    op: FilterOp,
    value: Value,
}

impl Filter {
    pub fn new(field: FieldPath, op: FilterOp, value: Value) -> Result<Self, QueryValidationError> {
        match op {
            FilterOp::In if !value.is_array() => Err(QueryValidationError::ExpectedArray { op }),
            FilterOp::Contains | FilterOp::StartsWith if !value.is_string() => {
                Err(QueryValidationError::ExpectedString { op })
            }
            _ if op.is_numeric() && !value.is_number() => {
                Err(QueryValidationError::ExpectedNumber { op })
            }
            _ => Ok(Self { field, op, value }),
        }
    }

    pub fn field(&self) -> &FieldPath {
        &self.field
    }

    pub fn op(&self) -> FilterOp {
        self.op
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Text form of each `in` candidate, matching how `->>` renders scalars.
    pub fn in_candidates(&self) -> Vec<String> {
        self.value
            .as_array()
            .map(|items| items.iter().map(scalar_text).collect())
            .unwrap_or_default()
    }

    /// Right-hand side of a numeric comparison.
    pub fn numeric_operand(&self) -> Option<f64> {
        self.value.as_f64()
    }

    /// Evaluate the filter against a payload in memory.
    ///
    /// Mirrors the SQL the persistence adapter emits: a missing field or a
    /// JSON `null` never satisfies a comparison except `== null`, numeric
    /// operators only consider JSON numbers, and text matching ignores case.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::{FieldPath, Filter, FilterOp};
    /// use serde_json::json;
    ///
    /// let data = json!({"views": 12, "title": "Hello"});
    /// let data = data.as_object().expect("object");
    /// let views = FieldPath::new("views").expect("field");
    /// let title = FieldPath::new("title").expect("field");
    ///
    /// assert!(Filter::new(views, FilterOp::Gt, json!(10)).expect("filter").matches(data));
    /// assert!(Filter::new(title, FilterOp::StartsWith, json!("he")).expect("filter").matches(data));
    /// ```
    pub fn matches(&self, data: &Payload) -> bool {
        let current = data.get(self.field.as_ref()).filter(|value| !value.is_null());
        match (self.op, current) {
            (FilterOp::Eq, None) => self.value.is_null(),
            (_, None) => false,
            (FilterOp::Eq, Some(_)) if self.value.is_null() => false,
            (FilterOp::Ne, Some(_)) if self.value.is_null() => true,
            (FilterOp::Eq, Some(value)) => scalar_text(value) == scalar_text(&self.value),
            (FilterOp::Ne, Some(value)) => scalar_text(value) != scalar_text(&self.value),
            (FilterOp::In, Some(value)) => self.in_candidates().contains(&scalar_text(value)),
            (FilterOp::Contains, Some(value)) => scalar_text(value)
                .to_lowercase()
                .contains(&scalar_text(&self.value).to_lowercase()),
            (FilterOp::StartsWith, Some(value)) => scalar_text(value)
                .to_lowercase()
                .starts_with(&scalar_text(&self.value).to_lowercase()),
            (op, Some(value)) => match (value.as_f64(), self.numeric_operand()) {
                (Some(left), Some(right)) => match op {
                    FilterOp::Gt => left > right,
                    FilterOp::Lt => left < right,
                    FilterOp::Gte => left >= right,
                    FilterOp::Lte => left <= right,
                    _ => false,
                },
                _ => false,
            },
        }
    }
}

/// Case-insensitive substring match over the serialised payload.
pub fn search_matches(data: &Payload, needle: &str) -> bool {
    let haystack = Value::Object(data.clone()).to_string().to_lowercase();
    haystack.contains(&needle.to_lowercase())
}

impl TryFrom<RawFilter> for Filter {
    type Error = QueryValidationError;

    fn try_from(raw: RawFilter) -> Result<Self, Self::Error> {
        Self::new(FieldPath::new(raw.field)?, raw.op, raw.value)
    }
}

/// Render a JSON scalar the way PostgreSQL's `->>` operator would.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Escape `%`, `_` and `\` so user text matches literally inside `LIKE`.
///
/// # Examples
/// ```
/// use backend::domain::escape_like;
///
/// assert_eq!(escape_like("50%_off"), "50\\%\\_off");
/// ```
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Sortable system columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    CreatedAt,
    UpdatedAt,
    Version,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Ordering applied to query results; defaults to most recent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl Default for OrderBy {
    fn default() -> Self {
        Self {
            column: SortColumn::CreatedAt,
            direction: SortDirection::Desc,
        }
    }
}

impl FromStr for OrderBy {
    type Err = QueryValidationError;

    /// Parse `"<column> [ASC|DESC]"`; direction defaults to ascending.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let column = match parts.next() {
            None => return Ok(Self::default()),
            Some(column) => match column.to_ascii_lowercase().as_str() {
                "created_at" => SortColumn::CreatedAt,
                "updated_at" => SortColumn::UpdatedAt,
                "version" => SortColumn::Version,
                _ => return Err(QueryValidationError::UnknownOrderColumn(column.to_owned())),
            },
        };
        let direction = match parts.next() {
            None => SortDirection::Asc,
            Some(direction) => match direction.to_ascii_uppercase().as_str() {
                "ASC" => SortDirection::Asc,
                "DESC" => SortDirection::Desc,
                _ => {
                    return Err(QueryValidationError::UnknownOrderDirection(
                        direction.to_owned(),
                    ))
                }
            },
        };
        if let Some(extra) = parts.next() {
            return Err(QueryValidationError::UnknownOrderDirection(extra.to_owned()));
        }
        Ok(Self { column, direction })
    }
}

/// Validated query over one collection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentQuery {
    pub filters: Vec<Filter>,
    pub select: Vec<FieldPath>,
    pub limit: i64,
    pub offset: i64,
    pub order_by: OrderBy,
    pub search: Option<String>,
}

impl DocumentQuery {
    /// Build a query, applying the default limit and clamping to the maximum.
    pub fn new(
        filters: Vec<Filter>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Self, QueryValidationError> {
        let offset = offset.unwrap_or(0);
        if offset < 0 {
            return Err(QueryValidationError::NegativeOffset);
        }
        let limit = match limit {
            Some(value) if value > 0 => value.min(MAX_QUERY_LIMIT),
            _ => DEFAULT_QUERY_LIMIT,
        };
        Ok(Self {
            filters,
            select: Vec::new(),
            limit,
            offset,
            order_by: OrderBy::default(),
            search: None,
        })
    }

    #[must_use]
    pub fn with_select(mut self, select: Vec<FieldPath>) -> Self {
        self.select = select;
        self
    }

    #[must_use]
    pub fn with_order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = order_by;
        self
    }

    /// Blank search strings are ignored.
    #[must_use]
    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = search.filter(|text| !text.trim().is_empty());
        self
    }
}
