use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One telemetry sample posted by a vehicle.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub speed_kmh: f64,
    /// Deviation from schedule in minutes: positive = late, negative = early.
    pub delay_minutes: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FactorType {
    Traffic,
    Weather,
    Historical,
    RealTime,
    Incident,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EtaFactor {
    #[serde(rename = "type")]
    pub kind: FactorType,
    /// -1..=1, negative = delay, positive = early
    pub impact: f64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Eta {
    pub bus_id: String,
    pub stop_id: String,
    pub estimated_arrival: DateTime<Utc>,
    pub estimated_minutes: f64,
    pub confidence: f64,
    pub factors: Vec<EtaFactor>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteSuggestion {
    pub route_id: String,
    pub route_name: String,
    pub stops: Vec<String>,
    pub estimated_duration: u32,
    /// Always 0: suggestions are single-route matches.
    pub transfers: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BusSnapshot {
    pub bus_id: String,
    pub route_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kmh: f64,
    pub next_stop_id: Option<String>,
    /// Smoothed speed, `None` until the bus has reported telemetry.
    pub average_speed_kmh: Option<f64>,
    pub average_delay_minutes: Option<f64>,
    pub delay_samples: usize,
    pub timestamp: DateTime<Utc>,
}

/// Envelope shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: None,
            timestamp: Utc::now(),
        }
    }
}
