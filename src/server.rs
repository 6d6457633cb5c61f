use crate::config::GapConfig;
use crate::error::GapFillError;
use crate::export;
use crate::orchestrator::GapFiller;
use crate::reconstruct::{reconstruct_route, RouteReconstruction};
use crate::route_fill::RouteFillClient;
use crate::track::{Track, TrackStats};
use crate::types::{parse_timestamp, Gap, Sample};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{OnceCell, RwLock};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// A track plus the reconstruction built for it once it finished.
///
/// The reconstruction is produced by a single fill pass and then served as-is,
/// so `/route` and `/gpx` always export the same samples.
struct TrackEntry {
    track: Track,
    route: Arc<OnceCell<Arc<RouteReconstruction>>>,
}

impl TrackEntry {
    fn new(track: Track) -> Self {
        TrackEntry {
            track,
            route: Arc::new(OnceCell::new()),
        }
    }
}

/// Shared server state: every track plus one process-wide gap filler.
///
/// All tracks draw on the same rate limiter and circuit breaker because the
/// provider quota belongs to a single credential.
pub struct AppState<C> {
    tracks: Arc<RwLock<HashMap<String, TrackEntry>>>,
    filler: Arc<GapFiller<C>>,
    gap_config: GapConfig,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        AppState {
            tracks: self.tracks.clone(),
            filler: self.filler.clone(),
            gap_config: self.gap_config.clone(),
        }
    }
}

impl<C: RouteFillClient + 'static> AppState<C> {
    pub fn new(filler: GapFiller<C>, gap_config: GapConfig) -> Self {
        AppState {
            tracks: Arc::new(RwLock::new(HashMap::new())),
            filler: Arc::new(filler),
            gap_config,
        }
    }
}

struct ApiError(GapFillError);

impl From<GapFillError> for ApiError {
    fn from(err: GapFillError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GapFillError::TrackNotFound(_) => StatusCode::NOT_FOUND,
            GapFillError::TrackFinished | GapFillError::TrackNotFinished(_) => StatusCode::CONFLICT,
            GapFillError::EmptyTrack | GapFillError::InvalidSample(_) => StatusCode::BAD_REQUEST,
            GapFillError::Config(_) | GapFillError::Io(_) | GapFillError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Deserialize)]
struct PointRequest {
    lat: f64,
    lon: f64,
    timestamp: Option<String>,
    accuracy: Option<f64>,
}

#[derive(Serialize)]
struct TrackView<'a> {
    #[serde(flatten)]
    track: &'a Track,
    stats: TrackStats,
}

pub fn router<C: RouteFillClient + 'static>(state: AppState<C>) -> Router {
    Router::new()
        .route("/api/track/start", post(start_track::<C>))
        .route("/api/track/:id", get(get_track::<C>))
        .route("/api/track/:id/point", post(add_point::<C>))
        .route("/api/track/:id/finish", post(finish_track::<C>))
        .route("/api/track/:id/gaps", get(get_gaps::<C>))
        .route("/api/track/:id/route", get(get_route::<C>))
        .route("/api/track/:id/gpx", get(get_gpx::<C>))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve<C: RouteFillClient + 'static>(state: AppState<C>, port: u16) -> std::io::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    log::info!("Listening on http://{}", addr);
    axum::serve(listener, router(state)).await
}

async fn start_track<C: RouteFillClient + 'static>(
    State(state): State<AppState<C>>,
) -> Json<serde_json::Value> {
    let track = Track::new(&state.gap_config);
    let track_id = track.id.clone();
    state
        .tracks
        .write()
        .await
        .insert(track_id.clone(), TrackEntry::new(track));
    log::info!("Started {}", track_id);
    Json(json!({ "track_id": track_id, "status": "started" }))
}

async fn add_point<C: RouteFillClient + 'static>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
    Json(point): Json<PointRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let timestamp = match point.timestamp.as_deref() {
        Some(raw) => parse_timestamp(raw)
            .ok_or_else(|| GapFillError::InvalidSample(format!("invalid timestamp: {}", raw)))?,
        None => Utc::now(),
    };
    let sample = Sample::observed(point.lat, point.lon, timestamp).with_accuracy(point.accuracy);

    let mut tracks = state.tracks.write().await;
    let track = &mut tracks
        .get_mut(&id)
        .ok_or_else(|| GapFillError::TrackNotFound(id.clone()))?
        .track;
    let gap = track.push_sample(sample)?;

    Ok(Json(json!({
        "status": "point_added",
        "total_points": track.samples().len(),
        "gap_detected": gap.is_some(),
    })))
}

async fn finish_track<C: RouteFillClient + 'static>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let has_samples = {
        let mut tracks = state.tracks.write().await;
        let track = &mut tracks
            .get_mut(&id)
            .ok_or_else(|| GapFillError::TrackNotFound(id.clone()))?
            .track;
        track.finish()?;
        log::info!(
            "Finished {} with {} samples, {} gap(s)",
            id,
            track.samples().len(),
            track.detected_gaps().len()
        );
        !track.samples().is_empty()
    };

    let summary = if has_samples {
        Some(reconstruction(&state, &id).await?.summary.clone())
    } else {
        None
    };
    Ok(Json(json!({ "status": "finished", "track_id": id, "summary": summary })))
}

async fn get_track<C: RouteFillClient + 'static>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let tracks = state.tracks.read().await;
    let track = &tracks
        .get(&id)
        .ok_or_else(|| GapFillError::TrackNotFound(id.clone()))?
        .track;
    let view = TrackView {
        track,
        stats: track.stats(),
    };
    Ok(Json(view).into_response())
}

async fn get_gaps<C: RouteFillClient + 'static>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Gap>>> {
    let tracks = state.tracks.read().await;
    let track = &tracks
        .get(&id)
        .ok_or_else(|| GapFillError::TrackNotFound(id.clone()))?
        .track;
    Ok(Json(track.detected_gaps().to_vec()))
}

/// The finished track's reconstruction, built by the first caller and shared afterwards.
///
/// The track is copied out so no lock is held across provider calls; once
/// finished it cannot change, so the copy is exact.
async fn reconstruction<C: RouteFillClient + 'static>(
    state: &AppState<C>,
    id: &str,
) -> Result<Arc<RouteReconstruction>, GapFillError> {
    let (track, cell) = {
        let tracks = state.tracks.read().await;
        let entry = tracks
            .get(id)
            .ok_or_else(|| GapFillError::TrackNotFound(id.to_string()))?;
        if !entry.track.is_finished() {
            return Err(GapFillError::TrackNotFinished(id.to_string()));
        }
        if let Some(route) = entry.route.get() {
            return Ok(route.clone());
        }
        (entry.track.clone(), entry.route.clone())
    };

    let route = cell
        .get_or_try_init(|| async {
            reconstruct_route(&track, &state.filler).await.map(Arc::new)
        })
        .await?;
    Ok(route.clone())
}

async fn get_route<C: RouteFillClient + 'static>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let route = reconstruction(&state, &id).await?;
    Ok(Json(&*route).into_response())
}

async fn get_gpx<C: RouteFillClient + 'static>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let route = reconstruction(&state, &id).await?;
    let short_id = id.get(id.len().saturating_sub(8)..).unwrap_or(&id);
    let body = export::to_gpx(&route, &format!("Route {}", short_id));

    Ok((
        [
            (header::CONTENT_TYPE, "application/gpx+xml".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"route_{}.gpx\"", short_id),
            ),
        ],
        body,
    )
        .into_response())
}
