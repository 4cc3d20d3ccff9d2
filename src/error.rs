use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use serde_json::json;
use thiserror::Error;

use crate::export::ExportError;
use crate::store::StoreError;

pub const INTERNAL_ERROR: &str = "Error interno del servidor";

/// Failures surfaced to HTTP clients as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Store(_) | ApiError::Export(_) => Status::InternalServerError,
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        let message = match &self {
            ApiError::BadRequest(message) | ApiError::NotFound(message) => *message,
            ApiError::Store(_) | ApiError::Export(_) => {
                error!("{} {} failed: {}", request.method(), request.uri(), self);
                INTERNAL_ERROR
            }
        };

        (status, Json(json!({ "error": message }))).respond_to(request)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
