//! Control request handlers

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Deserialize;

use crate::actuator::Direction;
use crate::error::Error;

use super::ControlState;

/// `GET /`
pub async fn root() -> Response {
    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, "/index.html")],
    )
        .into_response()
}

/// `GET /index.html`
pub async fn index(State(state): State<Arc<ControlState>>) -> Response {
    static_content("text/html; charset=utf-8", state.page.clone())
}

/// `GET /jsmpg.js`
pub async fn script(State(state): State<Arc<ControlState>>) -> Response {
    static_content("application/javascript", state.assets.script.clone())
}

/// Query of a move request
#[derive(Debug, Deserialize)]
pub struct MoveParams {
    pub direction: Option<String>,
}

/// `GET /move?direction=...`
///
/// A missing or unknown direction is accepted and ignored. A query that
/// does not parse (e.g. a repeated `direction`) is a client error.
pub async fn drive(
    State(state): State<Arc<ControlState>>,
    query: Result<Query<MoveParams>, QueryRejection>,
) -> Result<StatusCode, Error> {
    let Query(params) = query.map_err(|e| Error::MalformedCommand(e.body_text()))?;

    let Some(name) = params.direction else {
        tracing::debug!("Move without direction ignored");
        return Ok(StatusCode::OK);
    };

    match name.parse::<Direction>() {
        Ok(direction) => {
            state.actuators.drive(direction);
            tracing::debug!(direction = direction.as_str(), "Move");
        }
        Err(e) => tracing::debug!(error = %e, "Move ignored"),
    }

    Ok(StatusCode::OK)
}

/// `GET /stop`
pub async fn stop(State(state): State<Arc<ControlState>>) -> StatusCode {
    state.actuators.stop();
    tracing::debug!("Stop");
    StatusCode::OK
}

/// Anything else
pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "File not found").into_response()
}

fn static_content(content_type: &'static str, body: Bytes) -> Response {
    let len = body.len();
    let mut response = body.into_response();
    let headers = response.headers_mut();

    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    if let Ok(value) = HeaderValue::from_str(&http_date_now()) {
        headers.insert(header::LAST_MODIFIED, value);
    }

    response
}

/// Current time in IMF-fixdate form, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`
pub fn http_date_now() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::MalformedCommand(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::debug!(error = %self, status = status.as_u16(), "Control request failed");
        (status, self.to_string()).into_response()
    }
}
