use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sessionlens_api_types::{AnalysisErrorBody, GraphqlErrorBody};

use crate::application::error::{ErrorReport, ProxyError};

fn status_for(err: &ProxyError) -> StatusCode {
    match err {
        ProxyError::Validation(_) => StatusCode::BAD_REQUEST,
        ProxyError::Upstream(upstream) => upstream
            .passthrough_status()
            .and_then(|status| StatusCode::from_u16(status).ok())
            .unwrap_or(StatusCode::BAD_GATEWAY),
        ProxyError::Analysis(_) => StatusCode::BAD_GATEWAY,
        ProxyError::AnalysisUnavailable | ProxyError::Storage(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ProxyError::EmptySession { .. } => StatusCode::NOT_FOUND,
        ProxyError::Interrupted(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Message shown to the caller. Storage details stay in the logs.
fn public_message(err: &ProxyError) -> String {
    match err {
        ProxyError::Storage(_) => "cache storage is unavailable".to_string(),
        other => other.to_string(),
    }
}

/// Diagnostic for the logging middleware, including the start of any
/// upstream error body.
fn report_for(source: &'static str, status: StatusCode, err: &ProxyError) -> ErrorReport {
    let mut report = ErrorReport::from_error(source, status, err);
    if let ProxyError::Upstream(upstream) = err {
        if let Some(excerpt) = upstream.body_excerpt() {
            report.messages.push(format!("upstream body: {excerpt}"));
        }
    }
    report
}

/// Error response for `/query`, in GraphQL error shape.
pub fn query_error_response(source: &'static str, err: &ProxyError) -> Response {
    let status = status_for(err);
    let body = GraphqlErrorBody::single(public_message(err));

    let mut response = (status, Json(body)).into_response();
    report_for(source, status, err).attach(&mut response);
    response
}

/// Error response for `/analyze` routes.
pub fn analysis_error_response(source: &'static str, err: &ProxyError) -> Response {
    let status = status_for(err);
    let body = AnalysisErrorBody {
        error: public_message(err),
    };

    let mut response = (status, Json(body)).into_response();
    report_for(source, status, err).attach(&mut response);
    response
}
