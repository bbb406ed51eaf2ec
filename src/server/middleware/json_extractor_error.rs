use actix_web::error::JsonPayloadError;
use actix_web::{HttpRequest, HttpResponse};
use log::debug;

use crate::server::handler::{ApiErrorResponse, ApiStatusCode};

/// Turn json extractor failures into the api's json error format
pub(crate) fn json_extractor_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    debug!("Json extractor error: {err}");

    actix_web::error::InternalError::from_response(
        err,
        HttpResponse::BadRequest().json(ApiErrorResponse::new(
            ApiStatusCode::InvalidJson,
            "Invalid json received".to_string(),
        )),
    )
    .into()
}
