//! Tenant identity: projects, API keys and the admitted request context.
//!
//! A tenant is a *project*. Callers may name it by its internal UUID or by
//! its public reference slug; [`TenantRef`] keeps the two apart so adapters
//! can choose the right lookup.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable internal identifier of a tenant (project).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(Uuid);

impl TenantId {
    /// Wrap an existing UUID.
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Generate a fresh identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TenantId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Caller-supplied reference to a tenant.
///
/// # Examples
/// ```
/// use backend::domain::TenantRef;
///
/// assert!(matches!(
///     TenantRef::parse("00000000-0000-0000-0000-000000000001"),
///     Some(TenantRef::Id(_))
/// ));
/// assert_eq!(
///     TenantRef::parse("acme-prod"),
///     Some(TenantRef::Reference("acme-prod".to_owned()))
/// );
/// assert_eq!(TenantRef::parse("null"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantRef {
    /// Internal project UUID.
    Id(TenantId),
    /// Public reference slug.
    Reference(String),
}

impl TenantRef {
    /// Parse a raw path or query value. Blank input and the literal `null`
    /// (sent by some SDKs for unset values) count as missing.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
            return None;
        }
        Some(match Uuid::parse_str(trimmed) {
            Ok(id) => Self::Id(TenantId::from_uuid(id)),
            Err(_) => Self::Reference(trimmed.to_owned()),
        })
    }
}

impl fmt::Display for TenantRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => id.fmt(f),
            Self::Reference(reference) => f.write_str(reference),
        }
    }
}

/// Tenant record as seen by the admission gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: TenantId,
    pub reference_id: String,
    pub owner_id: Uuid,
    pub name: String,
    pub active: bool,
}

/// API key record resolved from the raw key string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyRecord {
    pub id: Uuid,
    pub project_id: TenantId,
    pub revoked: bool,
    pub usage_count: i64,
}

impl ApiKeyRecord {
    /// True when the key may be used against `project`.
    pub fn belongs_to(&self, project: &Project) -> bool {
        self.project_id == project.id
    }
}

/// Identity attached to a request once the gateway admitted it.
///
/// Downstream handlers trust this value and never resolve tenants again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
    reference_id: String,
    api_key_id: Option<Uuid>,
}

impl TenantContext {
    /// Build a context for an admitted request.
    pub fn new(tenant_id: TenantId, reference_id: impl Into<String>) -> Self {
        Self {
            tenant_id,
            reference_id: reference_id.into(),
            api_key_id: None,
        }
    }

    /// Record which API key admitted the request.
    pub fn with_api_key(mut self, api_key_id: Uuid) -> Self {
        self.api_key_id = Some(api_key_id);
        self
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn reference_id(&self) -> &str {
        &self.reference_id
    }

    pub fn api_key_id(&self) -> Option<Uuid> {
        self.api_key_id
    }
}
