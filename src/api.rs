use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc};

use crate::catalog::{self, Bus, Catalog, Route};
use crate::config::EstimatorConfig;
use crate::error::ApiError;
use crate::predictor::EtaEstimator;
use crate::types::{ApiResponse, BusSnapshot, Eta, Observation, RouteSuggestion};

// ---------- Server state ----------

#[derive(Clone)]
pub struct AppState {
    pub estimator: Arc<EtaEstimator>,
    pub catalog: Arc<Catalog>,
    pub fleet: Arc<RwLock<HashMap<String, Bus>>>,
}

impl AppState {
    pub fn new(cfg: EstimatorConfig, catalog: Catalog, fleet: Vec<Bus>) -> Self {
        let fleet = fleet.into_iter().map(|b| (b.id.clone(), b)).collect();
        Self {
            estimator: Arc::new(EtaEstimator::new(cfg)),
            catalog: Arc::new(catalog),
            fleet: Arc::new(RwLock::new(fleet)),
        }
    }

    /// Demo network with the given estimator settings.
    pub fn demo(cfg: EstimatorConfig) -> Self {
        Self::new(cfg, Catalog::demo(), catalog::demo_fleet())
    }

    fn snapshot(&self, bus: &Bus) -> BusSnapshot {
        let history = self.estimator.history(&bus.id);
        BusSnapshot {
            bus_id: bus.id.clone(),
            route_id: bus.route_id.clone(),
            latitude: bus.latitude,
            longitude: bus.longitude,
            speed_kmh: bus.speed_kmh,
            next_stop_id: bus.next_stop_id.clone(),
            average_speed_kmh: history.as_ref().map(|h| h.average_speed_kmh()),
            average_delay_minutes: history.as_ref().map(|h| h.average_delay()),
            delay_samples: history.as_ref().map_or(0, |h| h.delay_count()),
            timestamp: Utc::now(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/ping", get(ping))
        .route("/api/buses", get(list_buses))
        .route("/api/buses/:bus_id", get(get_bus))
        .route("/api/buses/:bus_id/observations", post(record_observation))
        .route("/api/buses/:bus_id/eta/:stop_id", get(get_eta))
        .route("/api/routes", get(list_routes))
        .route("/api/routes/suggest", get(suggest_routes))
        .with_state(state)
}

// ---------- Request types ----------

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EtaQuery {
    distance_km: Option<f64>,
}

#[derive(Deserialize, Debug)]
pub struct SuggestQuery {
    from: Option<String>,
    to: Option<String>,
}

// ---------- Handlers ----------

async fn ping() -> Json<Value> {
    Json(json!({ "message": "pong", "timestamp": Utc::now() }))
}

async fn list_buses(State(state): State<AppState>) -> Json<ApiResponse<Vec<BusSnapshot>>> {
    let mut buses: Vec<BusSnapshot> = {
        let fleet = state.fleet.read();
        fleet.values().map(|b| state.snapshot(b)).collect()
    };
    buses.sort_by(|a, b| a.bus_id.cmp(&b.bus_id));
    Json(ApiResponse::ok(buses))
}

async fn get_bus(
    State(state): State<AppState>,
    Path(bus_id): Path<String>,
) -> Result<Json<ApiResponse<BusSnapshot>>, ApiError> {
    let bus = state
        .fleet
        .read()
        .get(&bus_id)
        .cloned()
        .ok_or(ApiError::BusNotFound(bus_id))?;
    Ok(Json(ApiResponse::ok(state.snapshot(&bus))))
}

async fn record_observation(
    State(state): State<AppState>,
    Path(bus_id): Path<String>,
    body: Result<Json<Observation>, JsonRejection>,
) -> Result<Json<ApiResponse<BusSnapshot>>, ApiError> {
    let Json(obs) = body.map_err(|e| ApiError::InvalidObservation(e.body_text()))?;
    validate_observation(&obs)?;

    let bus = {
        let mut fleet = state.fleet.write();
        let bus = fleet
            .get_mut(&bus_id)
            .ok_or_else(|| ApiError::BusNotFound(bus_id.clone()))?;
        bus.speed_kmh = obs.speed_kmh;
        if let (Some(lat), Some(lon)) = (obs.latitude, obs.longitude) {
            bus.latitude = lat;
            bus.longitude = lon;
        }
        bus.clone()
    };

    state
        .estimator
        .record_observation(&bus_id, obs.speed_kmh, obs.delay_minutes);

    Ok(Json(
        ApiResponse::ok(state.snapshot(&bus)).with_message("Observation recorded"),
    ))
}

async fn get_eta(
    State(state): State<AppState>,
    Path((bus_id, stop_id)): Path<(String, String)>,
    query: Result<Query<EtaQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<Eta>>>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::InvalidQuery(e.body_text()))?;
    let bus = state
        .fleet
        .read()
        .get(&bus_id)
        .cloned()
        .ok_or_else(|| ApiError::BusNotFound(bus_id.clone()))?;

    let distance_km = match query.distance_km {
        Some(d) if !d.is_finite() || d < 0.0 => {
            return Err(ApiError::InvalidQuery(format!(
                "distanceKm must be a non-negative number, got {}",
                d
            )))
        }
        Some(d) => d,
        None => {
            let stop = state
                .catalog
                .stop(&stop_id)
                .ok_or_else(|| ApiError::StopNotFound(stop_id.clone()))?;
            catalog::distance_km(bus.latitude, bus.longitude, stop.latitude, stop.longitude)
        }
    };

    let eta = state
        .estimator
        .estimate(&bus_id, &stop_id, distance_km, Utc::now());
    Ok(Json(ApiResponse::ok(vec![eta])))
}

async fn list_routes(State(state): State<AppState>) -> Json<ApiResponse<Vec<Route>>> {
    Json(ApiResponse::ok(state.catalog.routes().to_vec()))
}

async fn suggest_routes(
    State(state): State<AppState>,
    query: Result<Query<SuggestQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<RouteSuggestion>>>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::InvalidQuery(e.body_text()))?;
    let (from, to) = match (query.from, query.to) {
        (Some(from), Some(to)) if !from.is_empty() && !to.is_empty() => (from, to),
        _ => {
            return Err(ApiError::InvalidQuery(
                "both `from` and `to` stop ids are required".to_string(),
            ))
        }
    };
    Ok(Json(ApiResponse::ok(state.catalog.suggest_routes(&from, &to))))
}

fn validate_observation(obs: &Observation) -> Result<(), ApiError> {
    if !obs.speed_kmh.is_finite() || obs.speed_kmh < 0.0 {
        return Err(ApiError::InvalidObservation(format!(
            "speedKmh must be a non-negative number, got {}",
            obs.speed_kmh
        )));
    }
    if !obs.delay_minutes.is_finite() {
        return Err(ApiError::InvalidObservation(
            "delayMinutes must be finite".to_string(),
        ));
    }
    match (obs.latitude, obs.longitude) {
        (None, None) => Ok(()),
        (Some(lat), Some(lon)) => {
            if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
                Ok(())
            } else {
                Err(ApiError::InvalidObservation(format!(
                    "coordinates out of range: {}, {}",
                    lat, lon
                )))
            }
        }
        _ => Err(ApiError::InvalidObservation(
            "latitude and longitude must be given together".to_string(),
        )),
    }
}
