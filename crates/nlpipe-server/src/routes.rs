//! Routing: maps HTTP verbs and paths onto [`nlpipe_core::Service`] calls.
//!
//! Grounded on spec.md §4.4's resource table. Path matching is hand-rolled
//! (no router crate appears anywhere in the corpus this project learns
//! from) the same way `oxcrypt-webdav::server` hands a raw `Request` to
//! `service_fn` and does its own dispatch.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde_json::Value;
use tracing::error;

use nlpipe_core::TaskStatus;

use crate::app::AppState;
use crate::error::ApiError;
use crate::index;

pub type BoxBody = Full<Bytes>;

/// Entry point handed to `hyper::service::service_fn`.
pub async fn handle(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let query = req.uri().query().unwrap_or("").to_owned();

    let result = dispatch(&state, method, &path, &query, req).await;
    Ok(match result {
        Ok(response) => response,
        Err(err) => error_response(&err),
    })
}

fn query_pairs(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

fn query_flag(params: &HashMap<String, String>, key: &str) -> bool {
    matches!(params.get(key).map(String::as_str), Some("1" | "true" | "yes"))
}

async fn read_body(req: Request<Incoming>) -> Result<Bytes, ApiError> {
    req.collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("failed to read request body: {e}")))
}

fn auth_header(req: &Request<Incoming>) -> Option<String> {
    req.headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

async fn dispatch(
    state: &Arc<AppState>,
    method: Method,
    path: &str,
    query: &str,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, ApiError> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match segments.as_slice() {
        [] if method == Method::GET => index::render(state).await,
        ["checktoken"] if method == Method::GET || method == Method::HEAD => {
            state.check_auth(auth_header(&req).as_deref())?;
            Ok(text_response(StatusCode::OK, "token accepted"))
        }
        ["api", "modules", module] => {
            state.check_auth(auth_header(&req).as_deref())?;
            match method {
                Method::POST => enqueue(state, module, req).await,
                Method::GET => claim(state, module).await,
                _ => Ok(method_not_allowed()),
            }
        }
        ["api", "modules", module, "bulk", "status"] if method == Method::POST => {
            state.check_auth(auth_header(&req).as_deref())?;
            bulk_status(state, module, req).await
        }
        ["api", "modules", module, "bulk", "result"] if method == Method::POST => {
            state.check_auth(auth_header(&req).as_deref())?;
            bulk_result(state, module, query, req).await
        }
        ["api", "modules", module, "bulk", "process"] if method == Method::POST => {
            state.check_auth(auth_header(&req).as_deref())?;
            bulk_process(state, module, query, req).await
        }
        ["api", "modules", module, id] => {
            state.check_auth(auth_header(&req).as_deref())?;
            match method {
                Method::HEAD => status(state, module, id).await,
                Method::GET => result(state, module, id, query).await,
                Method::PUT => put_result(state, module, id, req).await,
                _ => Ok(method_not_allowed()),
            }
        }
        _ => Ok(not_found_plain("no such resource")),
    }
}

async fn enqueue(state: &AppState, module: &str, req: Request<Incoming>) -> Result<Response<BoxBody>, ApiError> {
    let doc = read_body(req).await?;
    let id = state.service.enqueue(module, &doc, None, false, false).await?;
    let location = format!("/api/modules/{module}/{id}");
    Ok(Response::builder()
        .status(StatusCode::ACCEPTED)
        .header("ID", &id)
        .header("Location", &location)
        .body(body_from(format!("{id}\n").into_bytes()))
        .expect("static header values are valid"))
}

async fn claim(state: &AppState, module: &str) -> Result<Response<BoxBody>, ApiError> {
    match state.service.claim(module).await? {
        Some((id, doc)) => {
            let location = format!("/api/modules/{module}/{id}");
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("ID", &id)
                .header("Location", &location)
                .body(body_from(doc))
                .expect("static header values are valid"))
        }
        None => Ok(not_found_plain("queue is empty")),
    }
}

async fn status(state: &AppState, module: &str, id: &str) -> Result<Response<BoxBody>, ApiError> {
    let status = state.service.status(module, id).await?;
    Ok(Response::builder()
        .status(status_code_for(status))
        .header("Status", status.as_str())
        .body(Full::new(Bytes::new()))
        .expect("static header values are valid"))
}

async fn result(state: &AppState, module: &str, id: &str, query: &str) -> Result<Response<BoxBody>, ApiError> {
    let params = query_pairs(query);
    let format = params.get("format").map(String::as_str);
    match state.service.result(module, id, format).await {
        Ok(bytes) => Ok(Response::builder()
            .status(StatusCode::OK)
            .header("ID", id)
            .body(body_from(bytes))
            .expect("static header values are valid")),
        Err(err) => Err(err.into()),
    }
}

async fn put_result(
    state: &AppState,
    module: &str,
    id: &str,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, ApiError> {
    let is_error = req
        .headers()
        .get(hyper::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/prs.error+text"));
    let payload = read_body(req).await?;

    if is_error {
        state.service.store_error(module, id, &payload).await?;
    } else {
        state.service.store_result(module, id, &payload).await?;
    }
    Ok(Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Full::new(Bytes::new()))
        .expect("static header values are valid"))
}

async fn bulk_status(state: &AppState, module: &str, req: Request<Incoming>) -> Result<Response<BoxBody>, ApiError> {
    let ids = parse_id_list(req).await?;
    let statuses = state.service.bulk_status(module, &ids).await?;
    let body: HashMap<String, &'static str> =
        statuses.into_iter().map(|(id, status)| (id, status.as_str())).collect();
    Ok(json_response(StatusCode::OK, &body))
}

async fn bulk_result(
    state: &AppState,
    module: &str,
    query: &str,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, ApiError> {
    let params = query_pairs(query);
    let format = params.get("format").map(String::as_str);
    let ids = parse_id_list(req).await?;
    let results = state.service.bulk_result(module, &ids, format).await?;
    let body: HashMap<String, String> = results
        .into_iter()
        .map(|(id, bytes)| (id, String::from_utf8_lossy(&bytes).into_owned()))
        .collect();
    Ok(json_response(StatusCode::OK, &body))
}

async fn bulk_process(
    state: &AppState,
    module: &str,
    query: &str,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, ApiError> {
    let params = query_pairs(query);
    let reset_error = query_flag(&params, "reset_error");
    let reset_pending = query_flag(&params, "reset_pending");

    let body = read_body(req).await?;
    let value: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("bulk/process body must be JSON: {e}")))?;

    let docs = match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| value_to_doc(item).map(|doc| (None, doc)))
            .collect::<Result<Vec<_>, _>>()?,
        Value::Object(map) => map
            .into_iter()
            .map(|(id, doc)| value_to_doc(doc).map(|doc| (Some(id), doc)))
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err(ApiError::bad_request("bulk/process body must be a JSON array or object")),
    };

    let ids = state
        .service
        .bulk_enqueue(module, docs, reset_error, reset_pending)
        .await?;
    Ok(json_response(StatusCode::OK, &ids))
}

fn value_to_doc(value: Value) -> Result<Vec<u8>, ApiError> {
    match value {
        Value::String(s) => Ok(s.into_bytes()),
        other => Err(ApiError::bad_request(format!(
            "bulk/process documents must be strings, got {other}"
        ))),
    }
}

async fn parse_id_list(req: Request<Incoming>) -> Result<Vec<String>, ApiError> {
    let body = read_body(req).await?;
    serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("expected a JSON list of ids: {e}")))
}

pub(crate) fn status_code_for(status: TaskStatus) -> StatusCode {
    StatusCode::from_u16(status.http_status()).expect("valid status codes only")
}

fn body_from(bytes: Vec<u8>) -> BoxBody {
    Full::new(Bytes::from(bytes))
}

fn text_response(status: StatusCode, text: &str) -> Response<BoxBody> {
    Response::builder()
        .status(status)
        .header(hyper::header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Full::new(Bytes::copy_from_slice(text.as_bytes())))
        .expect("static header values are valid")
}

fn not_found_plain(text: &str) -> Response<BoxBody> {
    text_response(StatusCode::NOT_FOUND, text)
}

fn method_not_allowed() -> Response<BoxBody> {
    text_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
}

fn json_response(status: StatusCode, body: &impl serde::Serialize) -> Response<BoxBody> {
    let bytes = serde_json::to_vec(body).unwrap_or_default();
    Response::builder()
        .status(status)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(bytes)))
        .expect("static header values are valid")
}

fn error_response(err: &ApiError) -> Response<BoxBody> {
    error!(status = %err.status, message = %err.message, "request failed");
    if err.status == StatusCode::INTERNAL_SERVER_ERROR && err.exception_class.is_some() {
        return Response::builder()
            .status(err.status)
            .header(hyper::header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(err.json_body())))
            .expect("static header values are valid");
    }
    text_response(err.status, &err.message)
}
