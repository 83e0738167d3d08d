//! Shared HTTP adapter state.
//!
//! Handlers receive this through `web::Data` so they depend only on driving
//! ports and stay testable without I/O.

use std::sync::Arc;

use crate::domain::ports::{ChannelManagement, DocumentStore};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub documents: Arc<dyn DocumentStore>,
    pub channels: Arc<dyn ChannelManagement>,
}

impl HttpState {
    /// Bundle the document and channel ports.
    ///
    /// # Examples
    /// ```no_run
    /// use std::sync::Arc;
    ///
    /// use backend::domain::ports::{
    ///     FixtureAnalyticsSink, FixtureChannelRepository, FixtureDocumentRepository,
    ///     FixtureEventRepository, FixtureUsageLedger,
    /// };
    /// use backend::domain::{DocumentService, RealtimeHub, RealtimeService};
    /// use backend::inbound::http::state::HttpState;
    ///
    /// let documents = DocumentService::new(
    ///     Arc::new(FixtureDocumentRepository),
    ///     Arc::new(FixtureUsageLedger),
    ///     Arc::new(FixtureAnalyticsSink),
    /// );
    /// let realtime = RealtimeService::new(
    ///     Arc::new(RealtimeHub::new()),
    ///     Arc::new(FixtureChannelRepository),
    ///     Arc::new(FixtureEventRepository),
    ///     Arc::new(FixtureUsageLedger),
    ///     Arc::new(FixtureAnalyticsSink),
    /// );
    /// let state = HttpState::new(Arc::new(documents), Arc::new(realtime));
    /// let _documents = state.documents.clone();
    /// ```
    pub fn new(documents: Arc<dyn DocumentStore>, channels: Arc<dyn ChannelManagement>) -> Self {
        Self {
            documents,
            channels,
        }
    }
}
