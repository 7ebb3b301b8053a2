//!
//! tablegate HTTP server
//! ---------------------
//! Axum front end for the access engine and the export pipeline.
//!
//! Request flow for `GET /api/v1.0/tables`:
//! - Basic credentials are verified first; failures get 401 with a Basic challenge.
//! - `file` is required (400 otherwise).
//! - The access engine canonicalizes the path and checks the caller's patterns (403 on deny).
//! - The canonical path is exported as streamed CSV or a single JSON array.
//!
//! Blocking work (argon2, filesystem probing, columnar decoding) runs on the blocking
//! pool. CSV chunks are produced one at a time as the client pulls the body, so a
//! disconnect drops the stream and releases the reader.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::access::{AccessControl, AccessPolicy, AuditSink, FanoutAudit, FileAudit, TracingAudit};
use crate::config::{GatewayConfig, VerifierMode};
use crate::error::{AppError, AppResult};
use crate::export::{export, ExportFormat, ExportOutput, ExportPipeline, ExportRequest, ParquetSource, TableSource};
use crate::identity::{
    authenticate, parse_basic_auth, AllowListVerifier, IdentityVerifier, NoValidationVerifier, StaticVerifier,
};

pub const TABLES_ROUTE: &str = "/api/v1.0/tables";
const REALM_CHALLENGE: &str = "Basic realm=\"tablegate\"";

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub access: AccessControl,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub source: Arc<dyn TableSource>,
    pub chunk_size: usize,
}

#[derive(Debug, Deserialize)]
pub struct TablesQuery {
    pub file: Option<String>,
    pub format: Option<String>,
}

/// Assemble policy, audit sinks, verifier and table source from a validated config.
pub fn build_state(cfg: &GatewayConfig) -> AppResult<AppState> {
    cfg.validate()?;
    let policy = Arc::new(AccessPolicy::from_table(&cfg.policy)?);

    let mut sinks: Vec<Arc<dyn AuditSink>> = vec![Arc::new(TracingAudit)];
    if let Some(path) = &cfg.audit_log {
        let file = FileAudit::open(path)
            .map_err(|e| AppError::config("bad_audit_log", format!("{}: {}", path.display(), e)))?;
        sinks.push(Arc::new(file));
    }
    let audit: Arc<dyn AuditSink> = if sinks.len() == 1 { sinks.remove(0) } else { Arc::new(FanoutAudit::new(sinks)) };

    let base: Box<dyn IdentityVerifier> = match cfg.verifier {
        VerifierMode::Static => Box::new(StaticVerifier::new(&cfg.credentials)?),
        VerifierMode::NoValidation => {
            warn!(target: "startup", "credential verification is DISABLED (verifier = none)");
            Box::new(NoValidationVerifier)
        }
    };
    let verifier: Arc<dyn IdentityVerifier> = match &cfg.allowed_identities {
        Some(list) => Arc::new(AllowListVerifier::new(base, list)),
        None => Arc::from(base),
    };

    let access = AccessControl::new(policy, audit, cfg.resolved_base_dir()?);
    Ok(AppState { access, verifier, source: Arc::new(ParquetSource), chunk_size: cfg.chunk_size })
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route(TABLES_ROUTE, get(tables))
        .with_state(state)
}

/// Validate the config, bind and serve until the listener fails.
pub async fn run_with_config(cfg: GatewayConfig) -> anyhow::Result<()> {
    let state = build_state(&cfg)?;
    let addr = cfg.socket_addr()?;
    info!(
        target: "startup",
        "tablegate starting: addr={}, chunk_size={}, verifier={}, identities={}, audit_log={:?}",
        addr,
        cfg.chunk_size,
        state.verifier.mode(),
        state.access.policy().identity_count(),
        cfg.audit_log
    );
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(target: "startup", "listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn root() -> &'static str { "tablegate ok" }

async fn tables(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<TablesQuery>, QueryRejection>,
) -> Response {
    let Some(creds) = parse_basic_auth(&headers) else {
        return unauthorized();
    };
    let verifier = state.verifier.clone();
    let identity = match tokio::task::spawn_blocking(move || authenticate(verifier.as_ref(), &creds)).await {
        Ok(Ok(identity)) => identity,
        Ok(Err(_)) => return unauthorized(),
        Err(e) => return error_response(&AppError::internal("join_error", e.to_string())),
    };

    let Ok(Query(q)) = query else {
        return error_response(&AppError::user("bad_query", "malformed query string"));
    };
    let file = match q.file {
        Some(f) if !f.trim().is_empty() => f,
        _ => return error_response(&AppError::user("missing_file", "query parameter 'file' is required")),
    };
    let format = ExportFormat::from_param(q.format.as_deref());

    let access = state.access.clone();
    let who = identity.clone();
    let requested = file.clone();
    let decision = match tokio::task::spawn_blocking(move || access.evaluate(&who, &requested)).await {
        Ok(d) => d,
        Err(e) => return error_response(&AppError::internal("join_error", e.to_string())),
    };
    let canonical = match decision.canonical {
        Some(path) if decision.allowed => path,
        _ => {
            info!(target: "tablegate::server", user = %identity, file = %file, "access denied");
            return error_response(&AppError::forbidden("access_denied", format!("{} may not read {}", identity, file)));
        }
    };

    info!(target: "tablegate::server", user = %identity, file = %canonical.display(), format = format.as_str(), "export requested");
    let req = ExportRequest { path: canonical, format, chunk_size: state.chunk_size };
    let source = state.source.clone();
    match tokio::task::spawn_blocking(move || export(source, &req)).await {
        Ok(Ok(ExportOutput::Stream(pipeline))) => csv_response(pipeline),
        Ok(Ok(ExportOutput::Document(doc))) => {
            (StatusCode::OK, [(header::CONTENT_TYPE, HeaderValue::from_static(format.content_type()))], doc).into_response()
        }
        Ok(Err(e)) => error_response(&e),
        Err(e) => error_response(&AppError::internal("join_error", e.to_string())),
    }
}

fn csv_response(pipeline: ExportPipeline) -> Response {
    let stream = futures_util::stream::unfold(Some(pipeline), |slot| async move {
        let mut pipeline = slot?;
        let pulled = tokio::task::spawn_blocking(move || {
            let next = pipeline.next_csv();
            (pipeline, next)
        })
        .await;
        match pulled {
            Ok((pipeline, Ok(Some(bytes)))) => Some((Ok(Bytes::from(bytes)), Some(pipeline))),
            Ok((_, Ok(None))) => None,
            // Headers are already sent; failing the body stream truncates the response.
            Ok((_, Err(e))) => {
                error!(target: "tablegate::server", "export aborted mid-stream: {}", e);
                Some((Err(std::io::Error::other(e.to_string())), None))
            }
            Err(e) => {
                error!(target: "tablegate::server", "chunk task failed: {}", e);
                Some((Err(std::io::Error::other(e.to_string())), None))
            }
        }
    });
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, HeaderValue::from_static(ExportFormat::Csv.content_type()))],
        Body::from_stream(stream),
    )
        .into_response()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, HeaderValue::from_static(REALM_CHALLENGE))],
        Json(json!({ "error": "Unauthorized access" })),
    )
        .into_response()
}

fn error_response(err: &AppError) -> Response {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    // Denials carry no body, so the caller learns nothing about the path
    if let AppError::Forbidden { .. } = err {
        return status.into_response();
    }
    if status.is_server_error() {
        error!(target: "tablegate::server", "request failed: {}", err);
    }
    (status, Json(err.to_json())).into_response()
}
