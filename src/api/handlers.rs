//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint. Each request gets a
//! child of the server's shutdown token, so in-flight backend calls observe
//! shutdown.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::backend::Backend;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::facade::Cache;
use crate::models::requests::validate_key;
use crate::models::{
    ClearResponse, CounterRequest, CounterResponse, DeleteResponse, GetResponse, HealthResponse,
    SetRequest, SetResponse, StatsResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<Cache>,
    /// Cancelled when the server shuts down
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(cache: Cache) -> Self {
        Self {
            cache: Arc::new(cache),
            shutdown: CancellationToken::new(),
        }
    }

    /// Builds the cache described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(Cache::new(config)?))
    }

    fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}

fn check_key(key: &str) -> Result<()> {
    match validate_key(key) {
        Some(message) => Err(CacheError::InvalidRequest(message)),
        None => Ok(()),
    }
}

/// Handler for PUT /set
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let cancel = state.request_token();
    let ttl = req.ttl();
    let value = Bytes::from(req.value);

    if req.nx {
        let stored = state.cache.set_nx(&cancel, &req.key, value, ttl).await?;
        return Ok(Json(if stored {
            SetResponse::new(req.key)
        } else {
            SetResponse::skipped(req.key)
        }));
    }

    state.cache.set(&cancel, &req.key, value, ttl).await?;
    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    check_key(&key)?;
    let value = state.cache.get(&state.request_token(), &key).await?;
    Ok(Json(GetResponse::new(key, &value)))
}

/// Handler for DELETE /del/:key
///
/// Answers 404 when the key does not exist.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    check_key(&key)?;
    let cancel = state.request_token();
    if !state.cache.exists(&cancel, &key).await? {
        return Err(CacheError::NotFound(key));
    }
    state.cache.delete(&cancel, &key).await?;
    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for POST /incr/:key
pub async fn incr_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: Option<Json<CounterRequest>>,
) -> Result<Json<CounterResponse>> {
    check_key(&key)?;
    let delta = body.map(|Json(req)| req).unwrap_or_default().delta;
    let value = state
        .cache
        .increment(&state.request_token(), &key, delta)
        .await?;
    Ok(Json(CounterResponse::new(key, value)))
}

/// Handler for POST /decr/:key
pub async fn decr_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: Option<Json<CounterRequest>>,
) -> Result<Json<CounterResponse>> {
    check_key(&key)?;
    let delta = body.map(|Json(req)| req).unwrap_or_default().delta;
    let value = state
        .cache
        .decrement(&state.request_token(), &key, delta)
        .await?;
    Ok(Json(CounterResponse::new(key, value)))
}

/// Handler for DELETE /clear
pub async fn clear_handler(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    state.cache.clear(&state.request_token()).await?;
    Ok(Json(ClearResponse::new()))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let stats = state.cache.stats(&state.request_token()).await?;
    Ok(Json(StatsResponse::new(
        state.cache.mode().kind().to_string(),
        stats,
    )))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    state.cache.health(&state.request_token()).await?;
    Ok(Json(HealthResponse::healthy()))
}
