//! Analytics metric identifiers emitted by the core services.

use std::fmt;

/// Metric bucket stored in the analytics `type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalyticsType {
    DatabaseUsage,
    RealtimeChannels,
    RealtimeEvents,
}

impl AnalyticsType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DatabaseUsage => "database_usage",
            Self::RealtimeChannels => "realtime_channels",
            Self::RealtimeEvents => "realtime_events",
        }
    }
}

impl fmt::Display for AnalyticsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metric keys inside each bucket's JSON object.
pub mod metric {
    pub const DOC_WRITES: &str = "doc_writes";
    pub const DOC_READS: &str = "doc_reads";
    pub const DOC_DELETES: &str = "doc_deletes";
    pub const TOTAL_CHANNELS: &str = "total_channels";
    pub const TOTAL_MESSAGES: &str = "total_messages";
}
