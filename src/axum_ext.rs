//! Axum integration for bitmap endpoints.
//!
//! [`EncodedResult`] and [`Error`] both implement `IntoResponse`, so a handler
//! can return `Result<EncodedResult, Error>` directly.
//!
//! | Error kind       | Status |
//! |------------------|--------|
//! | Configuration    | 400    |
//! | Resource missing | 404    |
//! | Anything else    | 500    |
//!
//! # Example
//!
//! ```rust,ignore
//! use axum::{extract::Query, routing::get, Router};
//! use epaper_bitmap::{encode_file_blocking, palette::registry, BitmapParams, EncodedResult, Error};
//!
//! async fn bitmap(Query(params): Query<BitmapParams>) -> Result<EncodedResult, Error> {
//!     let (request, model) = display.resolve(&params, registry())?;
//!     encode_file_blocking("/var/cache/pages/kitchen.png".into(), request, model.clone()).await
//! }
//!
//! let app = Router::new().route("/bitmap", get(bitmap));
//! ```

use std::path::PathBuf;

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::StatusCode;

use crate::error::Error;
use crate::palette::ColorModel;
use crate::pipeline::{encode_file, EncodedResult};
use crate::request::TransformRequest;

impl IntoResponse for EncodedResult {
    fn into_response(self) -> Response {
        let mut response = (
            StatusCode::OK,
            [(CONTENT_TYPE, HeaderValue::from_static(self.content_type))],
            self.bytes,
        )
            .into_response();

        for (name, value) in self.headers {
            match HeaderName::from_bytes(name.as_bytes()) {
                Ok(name) => {
                    response
                        .headers_mut()
                        .insert(name, HeaderValue::from_static(value));
                }
                Err(e) => tracing::warn!("Dropping invalid header {}: {}", name, e),
            }
        }
        response
    }
}

impl Error {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        if self.is_configuration_fault() {
            StatusCode::BAD_REQUEST
        } else if self.is_resource_fault() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Bitmap encode failed: {}", self);
        } else {
            tracing::warn!("Bitmap request rejected: {}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Run [`encode_file`] on tokio's blocking pool.
///
/// The encode is CPU-bound; keeping it off the async workers keeps other
/// requests responsive while a large frame is packed.
pub async fn encode_file_blocking(
    path: PathBuf,
    request: TransformRequest,
    model: ColorModel,
) -> Result<EncodedResult, Error> {
    tokio::task::spawn_blocking(move || encode_file(&path, &request, &model))
        .await
        .map_err(|e| Error::Io(format!("Encode task failed: {}", e)))?
}
