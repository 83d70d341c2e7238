//! Response envelope and error mapping.
//!
//! Every body is `{"success": bool, "data"?: ..., "error"?: string}`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::error;

use crate::domain::TradeError;

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 200 with `data`.
pub fn ok<T: Serialize>(data: T) -> Response {
    respond(StatusCode::OK, data)
}

/// 201 with `data`.
pub fn created<T: Serialize>(data: T) -> Response {
    respond(StatusCode::CREATED, data)
}

fn respond<T: Serialize>(status: StatusCode, data: T) -> Response {
    let body = Envelope {
        success: true,
        data: Some(data),
        error: None,
    };
    (status, Json(body)).into_response()
}

/// Failure envelope with an explicit status.
pub fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    let body: Envelope<()> = Envelope {
        success: false,
        data: None,
        error: Some(message.into()),
    };
    (status, Json(body)).into_response()
}

/// A `TradeError` on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub TradeError);

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match self.0 {
            TradeError::Validation(_) | TradeError::Conflict(_) => StatusCode::BAD_REQUEST,
            TradeError::Authorization(_) => StatusCode::FORBIDDEN,
            TradeError::NotFound(_) => StatusCode::NOT_FOUND,
            TradeError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            TradeError::Dependency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TradeError> for ApiError {
    fn from(err: TradeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            TradeError::Dependency(detail) => {
                error!(detail = %detail, "Dependency failure in request path");
                "internal error: a required service is unavailable".to_string()
            }
            other => other.to_string(),
        };
        failure(status, message)
    }
}

/// `Json` extractor whose rejections use the envelope and map to 400.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError(TradeError::Validation(body_error(&rejection)))),
        }
    }
}

fn body_error(rejection: &JsonRejection) -> String {
    format!("invalid request body: {}", rejection.body_text())
}

/// Parse an optional JSON body; an empty body yields `T::default()`.
pub fn optional_body<T: DeserializeOwned + Default>(bytes: &[u8]) -> Result<T, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes)
        .map_err(|e| ApiError(TradeError::Validation(format!("invalid request body: {e}"))))
}
