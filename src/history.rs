use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Smoothed speed and recent schedule deviation of one vehicle.
#[derive(Debug, Clone)]
pub struct VehicleHistory {
    /// Running speed estimate in km/h, `avg = (avg + sample) / 2`.
    average_speed_kmh: f64,
    /// Last delay observations in minutes, oldest first. Positive = late.
    delays: VecDeque<f64>,
    last_seen: Instant,
}

impl VehicleHistory {
    fn new(window: usize, now: Instant) -> Self {
        Self {
            average_speed_kmh: 0.0,
            delays: VecDeque::with_capacity(window),
            last_seen: now,
        }
    }

    pub fn average_speed_kmh(&self) -> f64 {
        self.average_speed_kmh
    }

    pub fn delays(&self) -> impl Iterator<Item = f64> + '_ {
        self.delays.iter().copied()
    }

    pub fn delay_count(&self) -> usize {
        self.delays.len()
    }

    /// Arithmetic mean of the queued delays, 0 when none are queued.
    pub fn average_delay(&self) -> f64 {
        if self.delays.is_empty() {
            return 0.0;
        }
        self.delays.iter().sum::<f64>() / self.delays.len() as f64
    }

    /// Population standard deviation of the queued delays, `None` below two samples.
    pub fn delay_std_dev(&self) -> Option<f64> {
        if self.delays.len() < 2 {
            return None;
        }
        let mean = self.average_delay();
        let var = self
            .delays
            .iter()
            .map(|d| (d - mean) * (d - mean))
            .sum::<f64>()
            / self.delays.len() as f64;
        Some(var.sqrt())
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }
}

/// Per-vehicle histories, bounded in count and optionally expiring.
///
/// A history older than `stale_after` reads as unseen right away. It is
/// removed on the next insertion of a new vehicle, or restarted from scratch
/// when that vehicle reports again.
pub struct HistoryTracker {
    /// Maximum number of delay samples kept per vehicle
    window: usize,
    /// Maximum number of vehicles tracked at once
    capacity: usize,
    stale_after: Option<Duration>,
    entries: HashMap<String, VehicleHistory>,
}

impl HistoryTracker {
    /// Create a tracker.
    ///
    /// # Arguments
    /// * `window` - Number of delay observations kept per vehicle
    /// * `capacity` - Number of vehicles tracked before the least recently seen one is dropped
    /// * `stale_after` - Age after which an unobserved vehicle is forgotten
    pub fn new(window: usize, capacity: usize, stale_after: Option<Duration>) -> Self {
        Self {
            window: window.max(1),
            capacity: capacity.max(1),
            stale_after,
            entries: HashMap::new(),
        }
    }

    pub fn record_observation(&mut self, vehicle_id: &str, speed_kmh: f64, delay_minutes: f64) {
        self.record_observation_at(vehicle_id, speed_kmh, delay_minutes, Instant::now());
    }

    /// Fold one observation into the vehicle's history, creating it on first sight.
    pub fn record_observation_at(
        &mut self,
        vehicle_id: &str,
        speed_kmh: f64,
        delay_minutes: f64,
        now: Instant,
    ) {
        let expired = self
            .entries
            .get(vehicle_id)
            .map_or(false, |h| self.is_stale(h, now));
        if expired {
            self.entries.remove(vehicle_id);
        }

        if !self.entries.contains_key(vehicle_id) {
            self.evict_stale(now);
            if self.entries.len() >= self.capacity {
                self.evict_least_recent();
            }
        }

        let window = self.window;
        let history = self
            .entries
            .entry(vehicle_id.to_string())
            .or_insert_with(|| VehicleHistory::new(window, now));

        history.average_speed_kmh = (history.average_speed_kmh + speed_kmh) / 2.0;
        if history.delays.len() >= window {
            history.delays.pop_front();
        }
        history.delays.push_back(delay_minutes);
        history.last_seen = now;
    }

    pub fn get(&self, vehicle_id: &str) -> Option<&VehicleHistory> {
        self.get_at(vehicle_id, Instant::now())
    }

    /// History of `vehicle_id` as of `now`, `None` if unknown or stale.
    pub fn get_at(&self, vehicle_id: &str, now: Instant) -> Option<&VehicleHistory> {
        self.entries
            .get(vehicle_id)
            .filter(|h| !self.is_stale(h, now))
    }

    fn is_stale(&self, history: &VehicleHistory, now: Instant) -> bool {
        self.stale_after
            .map_or(false, |max_age| now.saturating_duration_since(history.last_seen) >= max_age)
    }

    /// Drop every history older than `stale_after`. Returns how many were dropped.
    pub fn evict_stale(&mut self, now: Instant) -> usize {
        let Some(max_age) = self.stale_after else {
            return 0;
        };
        let before = self.entries.len();
        self.entries
            .retain(|_, h| now.saturating_duration_since(h.last_seen) < max_age);
        let dropped = before - self.entries.len();
        if dropped > 0 {
            tracing::warn!("evicted {} stale vehicle histories", dropped);
        }
        dropped
    }

    fn evict_least_recent(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, h)| h.last_seen)
            .map(|(id, _)| id.clone());
        if let Some(id) = oldest {
            tracing::warn!(vehicle = %id, "history capacity reached, dropping least recently seen");
            self.entries.remove(&id);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
