//! The human-readable index page (`GET /`, spec.md §4.4).
//!
//! Lists every registered module, its `CheckStatus` probe result, and
//! its per-bucket task counts — the one page an operator is expected to
//! open in a browser to eyeball server health.

use std::fmt::Write as _;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

use crate::app::AppState;
use crate::error::ApiError;
use crate::routes::BoxBody;

pub async fn render(state: &Arc<AppState>) -> Result<Response<BoxBody>, ApiError> {
    let mut out = String::from("NLPipe\n======\n\n");
    for (name, processor) in state.service.registry().iter() {
        let health = match processor.check_status() {
            Ok(()) => "ok".to_owned(),
            Err(reason) => format!("FAILING: {reason}"),
        };
        let _ = writeln!(out, "module: {name} [{health}]");
        match state.service.statistics(name).await {
            Ok(stats) => {
                let mut counts: Vec<_> = stats.into_iter().collect();
                counts.sort_by_key(|(status, _)| status.as_str());
                for (status, count) in counts {
                    let _ = writeln!(out, "  {status}: {count}");
                }
            }
            Err(err) => {
                let _ = writeln!(out, "  (failed to read statistics: {err})");
            }
        }
        out.push('\n');
    }

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(hyper::header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(out)))
        .expect("static header values are valid"))
}
