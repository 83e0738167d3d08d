//! Request extractor for the admitted tenant.

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpMessage, HttpRequest};
use futures_util::future::{Ready, ready};

use crate::domain::{Error, TenantContext};

/// Handlers take a `TenantContext` argument; the [`crate::middleware::Admission`]
/// middleware is the only writer. A route mounted outside the admitted scope
/// fails closed with `unauthorized`.
impl FromRequest for TenantContext {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Self>()
                .cloned()
                .ok_or_else(|| Error::unauthorized("API Key required")),
        )
    }
}
