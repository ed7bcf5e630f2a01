//! HTTP boundary for the excluded UI layer: read-only state views plus
//! the five user intents. Rendering happens elsewhere; this module only
//! publishes snapshots and forwards intents into the session.

use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::info;

use crate::{
    runtime::{SessionError, SessionHandle},
    world::{CitySnapshot, DepositId, Position},
};

pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone)]
struct AppState {
    handle: SessionHandle,
}

pub async fn serve(config: WebConfig, handle: SessionHandle) -> Result<()> {
    let state = Arc::new(AppState { handle });
    let router = Router::new()
        .route("/api/state", get(latest_state))
        .route("/api/events", get(stream_events))
        .route("/api/buildings", post(place_building))
        .route("/api/training", post(start_training))
        .route("/api/deposits/:id/collect", post(collect_deposit))
        .route("/api/tax", post(set_tax_rate))
        .route("/api/trade", post(trade_food))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "city interface listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down city interface");
}

#[derive(Serialize)]
struct StateEnvelope {
    generated_at: String,
    snapshot: CitySnapshot,
}

async fn latest_state(State(state): State<Arc<AppState>>) -> Result<Json<StateEnvelope>, ApiError> {
    let snapshot = state.handle.snapshot().await?;
    Ok(Json(StateEnvelope {
        generated_at: Utc::now().to_rfc3339(),
        snapshot,
    }))
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.handle.subscribe_frames();
    let stream = BroadcastStream::new(rx).filter_map(|frame| match frame {
        Ok(frame) => serde_json::to_string(&frame)
            .ok()
            .map(|payload| Ok(Event::default().data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}

#[derive(Deserialize)]
struct PlaceBuildingRequest {
    type_id: String,
    x: f64,
    y: f64,
}

#[derive(Serialize)]
struct PlaceBuildingResponse {
    id: u64,
}

async fn place_building(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PlaceBuildingRequest>,
) -> Result<Json<PlaceBuildingResponse>, ApiError> {
    let id = state
        .handle
        .place_building(&request.type_id, Position::new(request.x, request.y))
        .await?;
    Ok(Json(PlaceBuildingResponse { id: id.raw() }))
}

#[derive(Deserialize)]
struct StartTrainingRequest {
    unit_type: String,
    x: f64,
    y: f64,
}

#[derive(Serialize)]
struct StartTrainingResponse {
    job_id: u64,
}

async fn start_training(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartTrainingRequest>,
) -> Result<Json<StartTrainingResponse>, ApiError> {
    let id = state
        .handle
        .start_training(&request.unit_type, Position::new(request.x, request.y))
        .await?;
    Ok(Json(StartTrainingResponse { job_id: id.raw() }))
}

#[derive(Serialize)]
struct CollectDepositResponse {
    collected: Option<u32>,
}

async fn collect_deposit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<CollectDepositResponse>, ApiError> {
    let collected = state
        .handle
        .collect_deposit(DepositId::from_raw(id))
        .await?;
    Ok(Json(CollectDepositResponse { collected }))
}

#[derive(Deserialize)]
struct TaxRequest {
    rate: u8,
}

#[derive(Serialize)]
struct TaxResponse {
    rate: u8,
}

async fn set_tax_rate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TaxRequest>,
) -> Result<Json<TaxResponse>, ApiError> {
    let rate = state.handle.set_tax_rate(request.rate).await?;
    Ok(Json(TaxResponse { rate }))
}

#[derive(Serialize)]
struct TradeResponse {
    traded: bool,
}

async fn trade_food(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TradeResponse>, ApiError> {
    let traded = state.handle.convert_food_to_gold().await?;
    Ok(Json(TradeResponse { traded }))
}

#[derive(Serialize)]
struct ErrorBody {
    kind: &'static str,
    error: String,
}

struct ApiError(SessionError);

impl From<SessionError> for ApiError {
    fn from(value: SessionError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self.0 {
            SessionError::Sim(err) => (StatusCode::UNPROCESSABLE_ENTITY, err.kind()),
            SessionError::Closed => (StatusCode::SERVICE_UNAVAILABLE, "session_closed"),
        };
        (
            status,
            Json(ErrorBody {
                kind,
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}
