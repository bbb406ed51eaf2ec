use std::future::{ready, Ready};

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header;
use futures::future::LocalBoxFuture;
use log::debug;

use crate::server::handler::ApiError;

/// Requires a valid `Authorization: Bearer <token>` header matching the
/// admin token from the configuration file.
pub(crate) struct AdminTokenRequired {
    pub(crate) token: String,
}

impl<S, B> Transform<S, ServiceRequest> for AdminTokenRequired
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Transform = AdminTokenRequiredMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminTokenRequiredMiddleware {
            token: self.token.clone(),
            service,
        }))
    }
}

pub(crate) struct AdminTokenRequiredMiddleware<S> {
    token: String,
    service: S,
}

impl<S, B> Service<ServiceRequest> for AdminTokenRequiredMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let authorized = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .and_then(|header| header.strip_prefix("Bearer "))
            .map_or(false, |token| token == self.token);

        let next = self.service.call(req);
        Box::pin(async move {
            if !authorized {
                debug!("Rejected request with missing or invalid admin token");
                return Err(ApiError::Unauthenticated.into());
            }

            next.await
        })
    }
}
