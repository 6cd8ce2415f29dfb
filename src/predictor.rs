//! Travel-time estimation from tracked vehicle history.
//!
//! `predict_eta` is the core estimate in minutes:
//!
//! * unknown vehicle: `distance / default_speed * 60`
//! * known vehicle: `distance / max(avg_speed, min_speed) * 60 + mean(delays)`
//!
//! The result is not clamped, so a vehicle running early can be predicted
//! below its pure-speed travel time. [`EtaEstimator::estimate`] wraps the
//! same number into an arrival time with confidence and factors.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;

use crate::config::{ConfidenceModel, EstimatorConfig};
use crate::history::{HistoryTracker, VehicleHistory};
use crate::types::{Eta, EtaFactor, FactorType};

/// Confidence reported for a vehicle whose delay spread cannot be measured yet.
const UNMEASURED_CONFIDENCE: f64 = 0.5;

/// Shared estimator: owns the history tracker and the prediction settings.
pub struct EtaEstimator {
    cfg: EstimatorConfig,
    tracker: Mutex<HistoryTracker>,
}

impl EtaEstimator {
    pub fn new(cfg: EstimatorConfig) -> Self {
        let tracker = HistoryTracker::new(cfg.delay_window, cfg.max_vehicles, cfg.stale_after());
        Self {
            cfg,
            tracker: Mutex::new(tracker),
        }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.cfg
    }

    pub fn record_observation(&self, vehicle_id: &str, speed_kmh: f64, delay_minutes: f64) {
        self.tracker
            .lock()
            .record_observation(vehicle_id, speed_kmh, delay_minutes);
        tracing::debug!(
            vehicle = vehicle_id,
            speed_kmh,
            delay_minutes,
            "observation recorded"
        );
    }

    /// Minutes needed by `vehicle_id` to cover `distance_km`.
    pub fn predict_eta(&self, vehicle_id: &str, distance_km: f64) -> f64 {
        let tracker = self.tracker.lock();
        self.minutes_locked(&tracker, vehicle_id, distance_km)
    }

    fn minutes_locked(&self, tracker: &HistoryTracker, vehicle_id: &str, distance_km: f64) -> f64 {
        match tracker.get(vehicle_id) {
            Some(history) => {
                let speed = history.average_speed_kmh().max(self.cfg.min_speed_kmh);
                distance_km / speed * 60.0 + history.average_delay()
            }
            None => distance_km / self.cfg.default_speed_kmh * 60.0,
        }
    }

    /// Snapshot of the tracked history for `vehicle_id`, if any.
    pub fn history(&self, vehicle_id: &str) -> Option<VehicleHistory> {
        self.tracker.lock().get(vehicle_id).cloned()
    }

    pub fn tracked_vehicles(&self) -> usize {
        self.tracker.lock().len()
    }

    /// Full ETA record for a bus heading to `stop_id`, `distance_km` away.
    pub fn estimate(
        &self,
        bus_id: &str,
        stop_id: &str,
        distance_km: f64,
        now: DateTime<Utc>,
    ) -> Eta {
        let (minutes, confidence) = {
            let tracker = self.tracker.lock();
            let minutes = self.minutes_locked(&tracker, bus_id, distance_km);
            (minutes, self.confidence(tracker.get(bus_id)))
        };
        let estimated_arrival = arrival_after(now, minutes);

        tracing::debug!(bus = bus_id, stop = stop_id, distance_km, minutes, confidence, "eta computed");

        Eta {
            bus_id: bus_id.to_string(),
            stop_id: stop_id.to_string(),
            estimated_arrival,
            estimated_minutes: minutes,
            confidence,
            factors: placeholder_factors(),
            last_updated: now,
        }
    }

    fn confidence(&self, history: Option<&VehicleHistory>) -> f64 {
        match self.cfg.confidence {
            ConfidenceModel::Fixed { value } => value,
            ConfidenceModel::DelayDispersion => history
                .and_then(VehicleHistory::delay_std_dev)
                .map(|sd| 1.0 / (1.0 + sd))
                .unwrap_or(UNMEASURED_CONFIDENCE),
        }
    }
}

/// `now + minutes`, floored at `now` and saturated at the latest representable instant.
fn arrival_after(now: DateTime<Utc>, minutes: f64) -> DateTime<Utc> {
    // An early-running bus can yield a negative estimate; never report an arrival in the past.
    let offset_ms = (minutes.max(0.0) * 60_000.0).round() as i64;
    ChronoDuration::try_milliseconds(offset_ms)
        .and_then(|offset| now.checked_add_signed(offset))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Static factor list carried on every ETA. The impacts are fixed values, not derived from data.
pub fn placeholder_factors() -> Vec<EtaFactor> {
    vec![
        EtaFactor {
            kind: FactorType::Historical,
            impact: 0.1,
            description: "Based on historical performance".to_string(),
        },
        EtaFactor {
            kind: FactorType::Traffic,
            impact: -0.05,
            description: "Current traffic conditions".to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> EtaEstimator {
        EtaEstimator::new(EstimatorConfig::default())
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_unknown_vehicle_uses_default_speed() {
        let est = estimator();
        for d in [0.0, 0.5, 2.5, 10.0, 123.4] {
            assert!(approx(est.predict_eta("ghost", d), d / 25.0 * 60.0), "d={}", d);
        }
        assert!(approx(est.predict_eta("V1", 2.5), 6.0));
    }

    #[test]
    fn test_single_observation_scenario() {
        let est = estimator();
        est.record_observation("V1", 30.0, 2.0);
        assert!(approx(est.predict_eta("V1", 2.5), 12.0));
    }

    #[test]
    fn test_negative_delay_reduces_estimate() {
        let est = estimator();
        est.record_observation("V1", 60.0, -4.0);
        // avg speed 30 -> 10 min for 5 km, minus 4 min early
        assert!(approx(est.predict_eta("V1", 5.0), 6.0));
    }

    #[test]
    fn test_zero_speed_is_floored() {
        let est = estimator();
        est.record_observation("parked", 0.0, 0.0);
        let m = est.predict_eta("parked", 1.0);
        assert!(m.is_finite(), "zero speed must not blow up");
        assert!(approx(m, 60.0), "1 km at the 1 km/h floor");
    }

    #[test]
    fn test_monotonic_in_distance() {
        let est = estimator();
        est.record_observation("V1", 42.0, 1.5);
        est.record_observation("V1", 18.0, -0.5);
        let mut prev = f64::NEG_INFINITY;
        for i in 0..50 {
            let m = est.predict_eta("V1", i as f64 * 0.3);
            assert!(m >= prev, "ETA decreased at step {}", i);
            prev = m;
        }
    }

    #[test]
    fn test_eleventh_observation_drops_first_delay() {
        let est = estimator();
        est.record_observation("V1", 30.0, 1000.0);
        for _ in 0..10 {
            est.record_observation("V1", 30.0, 0.0);
        }
        let h = est.history("V1").unwrap();
        assert_eq!(h.delay_count(), 10);
        assert_eq!(h.average_delay(), 0.0, "the 1000 min outlier has been evicted");
    }

    #[test]
    fn test_estimate_fixed_confidence_and_factors() {
        let est = estimator();
        let now = Utc::now();
        est.record_observation("BUS001", 30.0, 2.0);

        let eta = est.estimate("BUS001", "stop1", 2.5, now);
        assert_eq!(eta.bus_id, "BUS001");
        assert_eq!(eta.stop_id, "stop1");
        assert!(approx(eta.estimated_minutes, 12.0));
        assert_eq!(eta.estimated_arrival, now + ChronoDuration::minutes(12));
        assert_eq!(eta.confidence, 0.85);
        assert_eq!(eta.factors.len(), 2);
        assert_eq!(eta.factors[0].kind, FactorType::Historical);
        assert_eq!(eta.factors[0].impact, 0.1);
        assert_eq!(eta.factors[1].kind, FactorType::Traffic);
        assert_eq!(eta.factors[1].impact, -0.05);
    }

    #[test]
    fn test_estimate_never_in_the_past() {
        let est = estimator();
        let now = Utc::now();
        est.record_observation("early", 60.0, -30.0);

        let eta = est.estimate("early", "stop2", 1.0, now);
        assert!(eta.estimated_minutes < 0.0);
        assert_eq!(eta.estimated_arrival, now);
    }

    #[test]
    fn test_estimate_agrees_with_predict_eta() {
        let est = estimator();
        let now = Utc::now();
        est.record_observation("known", 35.0, 1.25);
        est.record_observation("known", 22.0, -0.5);

        for id in ["known", "unknown"] {
            for d in [0.0, 1.7, 8.0] {
                let eta = est.estimate(id, "stop1", d, now);
                assert_eq!(eta.estimated_minutes, est.predict_eta(id, d), "{} at {} km", id, d);
            }
        }
    }

    #[test]
    fn test_huge_distance_saturates_arrival() {
        let est = estimator();
        let now = Utc::now();

        let eta = est.estimate("BUS001", "stop1", 1e12, now);
        assert!(eta.estimated_minutes > 1e12);
        assert_eq!(eta.estimated_arrival, DateTime::<Utc>::MAX_UTC);

        let eta = est.estimate("BUS001", "stop1", f64::MAX, now);
        assert_eq!(eta.estimated_arrival, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_huge_delay_saturates_arrival() {
        let est = estimator();
        let now = Utc::now();
        est.record_observation("late", 20.0, 1e15);

        let eta = est.estimate("late", "stop2", 1.0, now);
        assert_eq!(eta.estimated_arrival, DateTime::<Utc>::MAX_UTC);
        assert!(serde_json::to_string(&eta).is_ok());
    }

    #[test]
    fn test_dispersion_confidence() {
        let est = EtaEstimator::new(EstimatorConfig {
            confidence: ConfidenceModel::DelayDispersion,
            ..EstimatorConfig::default()
        });
        let now = Utc::now();

        assert_eq!(est.estimate("V1", "s", 1.0, now).confidence, UNMEASURED_CONFIDENCE);

        est.record_observation("V1", 20.0, 2.0);
        est.record_observation("V1", 20.0, 2.0);
        assert_eq!(est.estimate("V1", "s", 1.0, now).confidence, 1.0, "no spread");

        est.record_observation("V1", 20.0, 5.0);
        let c = est.estimate("V1", "s", 1.0, now).confidence;
        assert!(c > 0.0 && c < 1.0);
    }

    #[test]
    fn test_shared_across_threads() {
        use std::sync::Arc;
        use std::thread;

        let est = Arc::new(estimator());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let est = Arc::clone(&est);
                thread::spawn(move || {
                    let id = format!("BUS{}", i);
                    for _ in 0..100 {
                        est.record_observation(&id, 20.0, 1.0);
                        let m = est.predict_eta(&id, 2.0);
                        assert!(m.is_finite());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(est.tracked_vehicles(), 4);
    }
}
