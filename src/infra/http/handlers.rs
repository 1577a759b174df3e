use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use sessionlens_api_types::{
    AnalysisDeleted, AnalyzeRequest, CACHE_STATUS_HEADER, FORCE_REFRESH_HEADER, GraphqlRequest,
    HealthResponse,
};

use crate::application::error::{ErrorReport, ProxyError};
use crate::domain::entities::CacheOrigin;

use super::error::{analysis_error_response, query_error_response};
use super::state::HttpState;

const SERVICE_NAME: &str = "sessionlens";

pub(super) async fn health(State(state): State<HttpState>) -> Response {
    match state.maintenance.health().await {
        Ok(()) => Json(HealthResponse {
            status: "ok".to_string(),
            service: SERVICE_NAME.to_string(),
        })
        .into_response(),
        Err(err) => {
            let mut response = (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable".to_string(),
                    service: SERVICE_NAME.to_string(),
                }),
            )
                .into_response();
            ErrorReport::from_error(
                "infra::http::health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

pub(super) async fn query(
    State(state): State<HttpState>,
    headers: HeaderMap,
    body: Result<Json<GraphqlRequest>, JsonRejection>,
) -> Response {
    const SOURCE: &str = "infra::http::query";

    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            let err = ProxyError::validation(rejection.body_text());
            return query_error_response(SOURCE, &err);
        }
    };

    match state
        .proxy
        .query(request, authorization(&headers), force_refresh(&headers))
        .await
    {
        Ok(fetched) => cached_json(fetched.document, fetched.origin),
        Err(err) => query_error_response(SOURCE, &err),
    }
}

pub(super) async fn analyze(
    State(state): State<HttpState>,
    headers: HeaderMap,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    const SOURCE: &str = "infra::http::analyze";

    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            let err = ProxyError::validation(rejection.body_text());
            return analysis_error_response(SOURCE, &err);
        }
    };

    match state
        .proxy
        .analyze(request.id.as_deref(), authorization(&headers))
        .await
    {
        Ok(computed) => cached_json(computed.document, computed.origin),
        Err(err) => analysis_error_response(SOURCE, &err),
    }
}

pub(super) async fn delete_analysis(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Response {
    match state
        .proxy
        .delete_analysis(&session_id, authorization(&headers))
        .await
    {
        Ok(deleted) => Json(AnalysisDeleted { deleted }).into_response(),
        Err(err) => analysis_error_response("infra::http::delete_analysis", &err),
    }
}

fn cached_json(document: Value, origin: CacheOrigin) -> Response {
    let mut response = Json(document).into_response();
    response.headers_mut().insert(
        CACHE_STATUS_HEADER,
        HeaderValue::from_static(origin.header_value()),
    );
    response
}

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

fn force_refresh(headers: &HeaderMap) -> bool {
    headers
        .get(FORCE_REFRESH_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
}
