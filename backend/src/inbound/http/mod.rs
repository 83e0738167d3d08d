//! HTTP inbound adapter exposing REST endpoints.
//!
//! Every project-scoped route is mounted under
//! `/api/v1/projects/{project_id}` behind the admission middleware; handlers
//! obtain the admitted tenant through the [`crate::domain::TenantContext`]
//! extractor.

pub mod collections;
pub mod documents;
pub mod envelope;
pub mod error;
pub mod health;
pub mod realtime;
pub mod schemas;
pub mod state;
mod tenant;
#[cfg(test)]
pub mod test_utils;
pub mod validation;

pub use error::ApiResult;

use actix_web::web;

use crate::domain::Error;

/// Register the project-scoped handlers on a scope.
///
/// Fixed sub-paths such as `/db/{collection}/count` and
/// `/db/{collection}/config` are registered before the `{id}` routes that
/// would otherwise capture them.
pub fn configure_project_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(collections::list_collections)
        .service(collections::create_collection)
        .service(collections::rename_collection)
        .service(collections::patch_collection)
        .service(collections::delete_collection)
        .service(collections::rename_collection_config)
        .service(collections::delete_collection_config)
        .service(documents::create_document)
        .service(documents::list_documents)
        .service(documents::query_documents)
        .service(documents::count_documents)
        .service(documents::count_all_documents)
        .service(documents::get_document)
        .service(documents::update_document)
        .service(documents::set_document)
        .service(documents::delete_document)
        .service(documents::upsert_document)
        .service(documents::document_exists)
        .service(documents::increment_field)
        .service(realtime::list_channels)
        .service(realtime::create_channel)
        .service(realtime::update_channel)
        .service(realtime::replace_channel)
        .service(realtime::delete_channel)
        .service(realtime::publish_event)
        .service(realtime::channel_history)
        .service(realtime::update_event)
        .service(realtime::replace_event)
        .service(realtime::delete_event);
}

/// Route extractor failures through the failure envelope instead of
/// actix's plain-text bodies.
pub fn extractor_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        Error::invalid_request(format!("Invalid JSON body: {err}")).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        Error::invalid_request(format!("Invalid query string: {err}")).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        Error::invalid_request(format!("Invalid path: {err}")).into()
    }));
}
