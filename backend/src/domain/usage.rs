//! Per-tenant usage counters, limits and quota evaluation.

use serde::{Deserialize, Serialize};

use super::{ErrorCode, TenantId};

/// Limit value meaning "no limit on this dimension".
pub const UNLIMITED: i64 = -1;

/// A `(used, limit)` pair for an integer dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Allowance {
    pub used: i64,
    pub limit: i64,
}

impl Allowance {
    pub const fn new(used: i64, limit: i64) -> Self {
        Self { used, limit }
    }

    /// True when the next unit would exceed the limit.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::{Allowance, UNLIMITED};
    ///
    /// assert!(Allowance::new(5, 5).is_exhausted());
    /// assert!(!Allowance::new(4, 5).is_exhausted());
    /// assert!(!Allowance::new(1_000_000, UNLIMITED).is_exhausted());
    /// ```
    pub const fn is_exhausted(&self) -> bool {
        self.limit != UNLIMITED && self.used >= self.limit
    }
}

/// Storage is metered in fractional megabytes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StorageAllowance {
    pub used_mb: f64,
    pub limit_mb: f64,
}

impl StorageAllowance {
    pub const fn new(used_mb: f64, limit_mb: f64) -> Self {
        Self { used_mb, limit_mb }
    }

    /// Any negative limit (conventionally `-1`) is unbounded.
    pub fn is_exhausted(&self) -> bool {
        self.limit_mb >= 0.0 && self.used_mb >= self.limit_mb
    }
}

/// Snapshot of a tenant's usage ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub tenant_id: TenantId,
    pub api_calls: Allowance,
    pub auth_users: Allowance,
    pub documents: Allowance,
    pub storage: StorageAllowance,
    pub notifications: Allowance,
    pub realtime_channels: Allowance,
    pub realtime_events: Allowance,
}

impl UsageRecord {
    /// A record with zero usage and no limits.
    pub fn unlimited(tenant_id: TenantId) -> Self {
        let open = Allowance::new(0, UNLIMITED);
        Self {
            tenant_id,
            api_calls: open,
            auth_users: open,
            documents: open,
            storage: StorageAllowance::new(0.0, -1.0),
            notifications: open,
            realtime_channels: open,
            realtime_events: open,
        }
    }

    fn is_exhausted(&self, dimension: QuotaDimension) -> bool {
        match dimension {
            QuotaDimension::AuthUsers => self.auth_users.is_exhausted(),
            QuotaDimension::Documents => self.documents.is_exhausted(),
            QuotaDimension::Storage => self.storage.is_exhausted(),
            QuotaDimension::ApiCalls => self.api_calls.is_exhausted(),
        }
    }

    /// Evaluate the quota dimensions implied by `path`.
    ///
    /// Every resource dimension the path touches is tested, then generic
    /// API-call volume. The first exhausted dimension is returned.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::{Allowance, QuotaDimension, TenantId, UsageRecord};
    ///
    /// let mut usage = UsageRecord::unlimited(TenantId::random());
    /// usage.documents = Allowance::new(10, 10);
    /// assert_eq!(
    ///     usage.check_path("/api/v1/projects/p/db/notes"),
    ///     Err(QuotaDimension::Documents)
    /// );
    /// assert_eq!(usage.check_path("/api/v1/projects/p/realtime/channels"), Ok(()));
    /// ```
    pub fn check_path(&self, path: &str) -> Result<(), QuotaDimension> {
        QuotaDimension::for_path(path)
            .into_iter()
            .chain(std::iter::once(QuotaDimension::ApiCalls))
            .find(|dimension| self.is_exhausted(*dimension))
            .map_or(Ok(()), Err)
    }
}

/// Quota dimensions enforced at admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaDimension {
    AuthUsers,
    Documents,
    Storage,
    ApiCalls,
}

impl QuotaDimension {
    /// Resource-specific dimensions implied by a request path.
    ///
    /// Only the segments after `/projects/{project_id}` are inspected, so a
    /// project identifier can never select or mask a dimension.
    pub fn for_path(path: &str) -> Vec<Self> {
        let path = path.to_ascii_lowercase();
        let segments: Vec<&str> = resource_path(&path)
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        let Some(resource) = segments.first().copied() else {
            return Vec::new();
        };

        let mut dimensions = Vec::new();
        if resource.starts_with("auth") {
            dimensions.push(Self::AuthUsers);
        }
        if resource == "db" || segments.contains(&"documents") {
            dimensions.push(Self::Documents);
        }
        if resource == "storage" {
            dimensions.push(Self::Storage);
        }
        dimensions
    }

    /// Error code reported when this dimension is exhausted.
    pub const fn error_code(self) -> ErrorCode {
        match self {
            Self::AuthUsers => ErrorCode::LimitReachedAuth,
            Self::Documents => ErrorCode::LimitReachedDb,
            Self::Storage => ErrorCode::LimitReachedStorage,
            Self::ApiCalls => ErrorCode::LimitReachedApi,
        }
    }

    /// Human-readable rejection message.
    pub const fn message(self) -> &'static str {
        match self {
            Self::AuthUsers => "Auth limit reached",
            Self::Documents => "Database limit reached",
            Self::Storage => "Storage limit reached",
            Self::ApiCalls => "API quota exceeded",
        }
    }
}

/// The part of `path` after the `/projects/{project_id}` prefix, or the whole
/// path when it is not project-scoped.
fn resource_path(path: &str) -> &str {
    const PREFIX: &str = "/projects/";
    let Some(start) = path.find(PREFIX) else {
        return path;
    };
    let scoped = &path[start + PREFIX.len()..];
    scoped.find('/').map_or("", |end| &scoped[end..])
}

/// Counters that may be incremented or decremented on the usage ledger.
///
/// Column names are fixed here so adapters never interpolate caller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageField {
    ApiCalls,
    AuthUsers,
    Documents,
    StorageMb,
    Notifications,
    RealtimeChannels,
    RealtimeEvents,
}

impl UsageField {
    pub const fn column(self) -> &'static str {
        match self {
            Self::ApiCalls => "api_calls",
            Self::AuthUsers => "auth_users_count",
            Self::Documents => "documents_count",
            Self::StorageMb => "storage_used_mb",
            Self::Notifications => "notifications_count",
            Self::RealtimeChannels => "realtime_channels_count",
            Self::RealtimeEvents => "realtime_events_count",
        }
    }
}

impl std::fmt::Display for UsageField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}
