//! Optional HTTP control-plane surface (§6, §10.5):
//! `GET /api/<group>/<match>/<command>/<value>`. `value` is omitted for a
//! read and present for a write; `<match>` is a `*`-glob scoped to the
//! group's own keyspace (the single `delay` key for options, connection
//! keys, or tag names). This is a thin collaborator around the data and
//! connection maps, not re-specified in detail by the core (§1).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::control::{glob_match, ConnectionsMap, Delay};
use crate::error::{EnipError, Result};

#[derive(Clone)]
pub struct ControlState {
    pub tags: Arc<crate::cip::TagRegistry>,
    pub connections: ConnectionsMap,
    pub delay: Arc<Delay>,
}

#[derive(Debug, serde::Serialize)]
struct ControlResponse {
    data: Value,
    command: CommandOutcome,
    alarm: bool,
    since: u64,
    until: Option<u64>,
}

#[derive(Debug, serde::Serialize)]
struct CommandOutcome {
    success: bool,
    message: String,
}

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

fn respond(status: StatusCode, body: ControlResponse) -> Response<Full<Bytes>> {
    let bytes = serde_json::to_vec(&body).unwrap_or_default();
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(bytes)))
        .expect("static response is well-formed")
}

fn ok(data: Value, message: impl Into<String>) -> Response<Full<Bytes>> {
    respond(
        StatusCode::OK,
        ControlResponse {
            data,
            command: CommandOutcome { success: true, message: message.into() },
            alarm: false,
            since: now_unix(),
            until: None,
        },
    )
}

fn failed(status: StatusCode, message: impl Into<String>) -> Response<Full<Bytes>> {
    respond(
        status,
        ControlResponse {
            data: Value::Null,
            command: CommandOutcome { success: false, message: message.into() },
            alarm: true,
            since: now_unix(),
            until: None,
        },
    )
}

fn handle_options(state: &ControlState, sub: &str, command: &str, value: Option<&str>) -> Response<Full<Bytes>> {
    if !glob_match(sub, "delay") {
        return failed(StatusCode::NOT_FOUND, format!("no options object matches {sub:?}"));
    }
    match (command, value) {
        ("value", None) => ok(json!(state.delay.get()), "read options.delay.value"),
        ("value", Some(v)) => match v.parse::<f64>() {
            Ok(parsed) => {
                state.delay.set(parsed);
                ok(json!(parsed), "set options.delay.value")
            }
            Err(_) => failed(StatusCode::BAD_REQUEST, format!("{v:?} is not a valid delay")),
        },
        ("range", None) => failed(StatusCode::BAD_REQUEST, "options.delay.range is write-only"),
        ("range", Some(v)) => match v.parse::<crate::config::DelaySpec>() {
            Ok(crate::config::DelaySpec::Range(lo, hi)) => {
                ok(json!({"lo": lo, "hi": hi}), "set options.delay.range")
            }
            Ok(crate::config::DelaySpec::Fixed(v)) => {
                state.delay.set(v);
                ok(json!(v), "set options.delay.value")
            }
            Err(e) => failed(StatusCode::BAD_REQUEST, e),
        },
        _ => failed(StatusCode::NOT_FOUND, format!("no options command {command:?}")),
    }
}

fn handle_connections(state: &ControlState, sub: &str, command: &str, value: Option<&str>) -> Response<Full<Bytes>> {
    let keys = state.connections.keys_matching(sub);
    if keys.is_empty() {
        return failed(StatusCode::NOT_FOUND, format!("no connections match {sub:?}"));
    }
    if command != "eof" {
        return failed(StatusCode::NOT_FOUND, format!("no connections command {command:?}"));
    }
    match value {
        None => {
            let data: Value = keys
                .iter()
                .filter_map(|k| state.connections.get(k).map(|s| (k.clone(), json!(s.should_close()))))
                .collect();
            ok(data, "read connections[*].eof")
        }
        Some(v) => {
            let truthy = matches!(v, "1" | "true" | "True" | "TRUE");
            if !truthy && v != "0" && !matches!(v, "false" | "False" | "FALSE") {
                return failed(StatusCode::BAD_REQUEST, format!("{v:?} is not a boolean"));
            }
            for key in &keys {
                if let Some(stats) = state.connections.get(key) {
                    if truthy {
                        stats.force_close();
                    }
                }
            }
            ok(json!(truthy), "set connections[*].eof")
        }
    }
}

fn handle_tags(state: &ControlState, sub: &str, command: &str, value: Option<&str>) -> Response<Full<Bytes>> {
    let names: Vec<String> = state.tags.names().filter(|n| glob_match(sub, n)).map(str::to_string).collect();
    if names.is_empty() {
        return failed(StatusCode::NOT_FOUND, format!("no tags match {sub:?}"));
    }
    if command != "error" {
        return failed(StatusCode::NOT_FOUND, format!("no tags command {command:?}"));
    }
    match value {
        None => {
            let data: Value = names
                .iter()
                .filter_map(|n| state.tags.get(n).map(|a| (n.clone(), json!(a.lock().expect("attribute lock poisoned").error))))
                .collect();
            ok(data, "read tags[*].error")
        }
        Some(v) => match v.parse::<u8>() {
            Ok(status) => {
                for name in &names {
                    let _ = state.tags.inject_error(name, status);
                }
                ok(json!(status), "set tags[*].error")
            }
            Err(_) => failed(StatusCode::BAD_REQUEST, format!("{v:?} is not a valid CIP status byte")),
        },
    }
}

async fn route(req: Request<Incoming>, state: ControlState) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    if req.method() != Method::GET {
        return Ok(failed(StatusCode::METHOD_NOT_ALLOWED, "only GET is supported"));
    }
    let segments: Vec<&str> = req.uri().path().trim_start_matches('/').split('/').collect();
    let resp = match segments.as_slice() {
        ["api", "options", sub, command] => handle_options(&state, sub, command, None),
        ["api", "options", sub, command, value] => handle_options(&state, sub, command, Some(value)),
        ["api", "connections", sub, command] => handle_connections(&state, sub, command, None),
        ["api", "connections", sub, command, value] => handle_connections(&state, sub, command, Some(value)),
        ["api", "tags", sub, command] => handle_tags(&state, sub, command, None),
        ["api", "tags", sub, command, value] => handle_tags(&state, sub, command, Some(value)),
        _ => failed(StatusCode::NOT_FOUND, format!("unrecognized path {:?}", req.uri().path())),
    };
    Ok(resp)
}

/// Run the control-plane HTTP server until the process is torn down. Mirrors
/// the data-plane listener's accept-loop shape (§10.5) with no TLS and no
/// connection-limit bookkeeping: this surface is a thin collaborator.
pub async fn run(addr: SocketAddr, state: ControlState) -> Result<()> {
    let listener = TcpListener::bind(addr).await.map_err(EnipError::Bind)?;
    let builder = ConnBuilder::new(TokioExecutor::new());
    info!(%addr, "control plane listening");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "control plane accept error");
                continue;
            }
        };
        let builder = builder.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let svc = service_fn(move |req| route(req, state.clone()));
            if let Err(e) = builder.serve_connection(TokioIo::new(stream), svc).await {
                warn!(%peer, error = %e, "control plane connection error");
            }
        });
    }
}
