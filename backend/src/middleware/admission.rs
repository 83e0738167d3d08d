//! Admission gateway middleware.
//!
//! Wrap the tenant-scoped route tree with [`Admission`]. For every request it
//! pulls the raw tenant reference and API key, asks the
//! [`TenantAdmission`] port for a verdict and either stores the resulting
//! [`TenantContext`] in the request extensions or answers with the rejection.
//!
//! Credential sources, first match wins:
//! - tenant: path segment `project_id`, then query `project_id`
//! - key: header `x-api-key`, then query `api_key`
//!
//! WebSocket upgrades pass through untouched; the socket endpoint admits its
//! own connections.

use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_web::body::EitherBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderMap, UPGRADE};
use actix_web::{Error, HttpMessage, ResponseError};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::debug;

use crate::domain::ports::{AdmissionRequest, TenantAdmission};

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Path and query parameter naming the tenant.
pub const PROJECT_ID_PARAM: &str = "project_id";
/// Query parameter fallback for the API key.
pub const API_KEY_PARAM: &str = "api_key";

/// True when the request asks to switch to the WebSocket protocol.
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(UPGRADE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("websocket"))
}

/// First value of `name` in a URL query string.
pub fn query_param(query: &str, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Collect raw credentials from a request.
pub fn admission_request(req: &ServiceRequest) -> AdmissionRequest {
    let query = req.query_string();
    let tenant_ref = req
        .match_info()
        .get(PROJECT_ID_PARAM)
        .map(str::to_owned)
        .or_else(|| query_param(query, PROJECT_ID_PARAM));
    let api_key = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .or_else(|| query_param(query, API_KEY_PARAM));
    AdmissionRequest {
        tenant_ref,
        api_key,
        path: req.path().to_owned(),
    }
}

/// Admission middleware factory.
#[derive(Clone)]
pub struct Admission {
    admission: Arc<dyn TenantAdmission>,
}

impl Admission {
    pub fn new(admission: Arc<dyn TenantAdmission>) -> Self {
        Self { admission }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Admission
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AdmissionMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdmissionMiddleware {
            service: Rc::new(service),
            admission: Arc::clone(&self.admission),
        }))
    }
}

/// Service wrapper produced by [`Admission`].
pub struct AdmissionMiddleware<S> {
    service: Rc<S>,
    admission: Arc<dyn TenantAdmission>,
}

impl<S, B> Service<ServiceRequest> for AdmissionMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        if is_websocket_upgrade(req.headers()) {
            return Box::pin(async move {
                service
                    .call(req)
                    .await
                    .map(ServiceResponse::map_into_left_body)
            });
        }

        let admission = Arc::clone(&self.admission);
        let request = admission_request(&req);
        Box::pin(async move {
            match admission.admit(&request).await {
                Ok(context) => {
                    req.extensions_mut().insert(context);
                    service
                        .call(req)
                        .await
                        .map(ServiceResponse::map_into_left_body)
                }
                Err(error) => {
                    debug!(code = %error.code(), path = %request.path, "request rejected");
                    let response = error.error_response();
                    Ok(req.into_response(response).map_into_right_body())
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "admission_tests.rs"]
mod tests;
