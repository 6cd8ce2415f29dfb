//! Demo network: stops, routes and the buses running on them.

use geo::{point, HaversineDistance};
use serde::Serialize;

use crate::types::RouteSuggestion;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: String,
    pub name: String,
    pub stops: Vec<String>,
    /// Scheduled end-to-end time in minutes.
    pub estimated_duration: u32,
}

impl Route {
    pub fn serves(&self, stop_id: &str) -> bool {
        self.stops.iter().any(|s| s == stop_id)
    }
}

/// Position and assignment of a bus, as last reported.
#[derive(Debug, Clone, PartialEq)]
pub struct Bus {
    pub id: String,
    pub route_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kmh: f64,
    pub next_stop_id: Option<String>,
}

pub struct Catalog {
    stops: Vec<Stop>,
    routes: Vec<Route>,
}

impl Catalog {
    pub fn new(stops: Vec<Stop>, routes: Vec<Route>) -> Self {
        Self { stops, routes }
    }

    pub fn demo() -> Self {
        let stops = vec![
            stop("stop1", "Central Station", 40.7128, -74.0060),
            stop("stop2", "Downtown Terminal", 40.7589, -73.9851),
            stop("stop3", "University Campus", 40.7505, -73.9934),
            stop("stop4", "Shopping Center", 40.7614, -73.9776),
        ];
        let routes = vec![
            route("ROUTE_1", "Downtown Express", &["stop1", "stop2"], 15),
            route("ROUTE_2", "University Line", &["stop2", "stop3"], 12),
            route("ROUTE_3", "Shopping District", &["stop2", "stop4"], 8),
        ];
        Self::new(stops, routes)
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn stop(&self, id: &str) -> Option<&Stop> {
        self.stops.iter().find(|s| s.id == id)
    }

    /// Routes serving both stops, shortest scheduled duration first.
    ///
    /// This is a single-route filter: no path search, no transfers, and no
    /// check that `from` comes before `to` on the route. Equal durations keep
    /// catalog order.
    pub fn suggest_routes(&self, from: &str, to: &str) -> Vec<RouteSuggestion> {
        let mut matches: Vec<&Route> = self
            .routes
            .iter()
            .filter(|r| r.serves(from) && r.serves(to))
            .collect();
        matches.sort_by_key(|r| r.estimated_duration);

        matches
            .into_iter()
            .map(|r| RouteSuggestion {
                route_id: r.id.clone(),
                route_name: r.name.clone(),
                stops: r.stops.clone(),
                estimated_duration: r.estimated_duration,
                transfers: 0,
            })
            .collect()
    }
}

pub fn demo_fleet() -> Vec<Bus> {
    vec![
        Bus {
            id: "BUS001".to_string(),
            route_id: "ROUTE_1".to_string(),
            latitude: 40.7128,
            longitude: -74.0060,
            speed_kmh: 25.0,
            next_stop_id: Some("stop1".to_string()),
        },
        Bus {
            id: "BUS002".to_string(),
            route_id: "ROUTE_2".to_string(),
            latitude: 40.7589,
            longitude: -73.9851,
            speed_kmh: 30.0,
            next_stop_id: Some("stop2".to_string()),
        },
    ]
}

/// Great-circle distance in kilometres.
pub fn distance_km(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> f64 {
    let a = point!(x: lon_a, y: lat_a);
    let b = point!(x: lon_b, y: lat_b);
    a.haversine_distance(&b) / 1000.0
}

fn stop(id: &str, name: &str, latitude: f64, longitude: f64) -> Stop {
    Stop {
        id: id.to_string(),
        name: name.to_string(),
        latitude,
        longitude,
    }
}

fn route(id: &str, name: &str, stops: &[&str], estimated_duration: u32) -> Route {
    Route {
        id: id.to_string(),
        name: name.to_string(),
        stops: stops.iter().map(|s| s.to_string()).collect(),
        estimated_duration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_suggest_demo_routes() {
        let catalog = Catalog::demo();
        let found = catalog.suggest_routes("stop1", "stop2");

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].route_id, "ROUTE_1");
        assert_eq!(found[0].estimated_duration, 15);
        assert_eq!(found[0].transfers, 0);
        assert_eq!(found[0].stops, vec!["stop1", "stop2"]);
    }

    #[test]
    fn test_suggest_ignores_direction() {
        let catalog = Catalog::demo();
        assert_eq!(
            catalog.suggest_routes("stop2", "stop1"),
            catalog.suggest_routes("stop1", "stop2")
        );
    }

    #[test]
    fn test_suggest_no_match() {
        let catalog = Catalog::demo();
        assert!(catalog.suggest_routes("stop3", "nowhere").is_empty());
        // no single demo route serves both ends, and transfers are not searched
        assert!(catalog.suggest_routes("stop3", "stop4").is_empty());
        assert!(catalog.suggest_routes("stop1", "stop3").is_empty());
    }

    #[test]
    fn test_suggest_sorted_by_duration() {
        let catalog = Catalog::new(
            vec![],
            vec![
                route("SLOW", "slow", &["x", "m", "y"], 30),
                route("OTHER", "other", &["x", "z"], 1),
                route("FAST", "fast", &["y", "x"], 9),
                route("MID", "mid", &["x", "y"], 17),
            ],
        );
        let found = catalog.suggest_routes("x", "y");

        let ids: Vec<&str> = found.iter().map(|s| s.route_id.as_str()).collect();
        assert_eq!(ids, vec!["FAST", "MID", "SLOW"]);
        assert!(found.iter().all(|s| s.transfers == 0));
        for s in &found {
            assert!(s.stops.contains(&"x".to_string()));
            assert!(s.stops.contains(&"y".to_string()));
        }
    }

    #[test]
    fn test_equal_durations_keep_catalog_order() {
        let catalog = Catalog::new(
            vec![],
            vec![
                route("B", "b", &["x", "y"], 10),
                route("A", "a", &["x", "y"], 10),
                route("C", "c", &["y", "x"], 5),
            ],
        );
        let ids: Vec<String> = catalog
            .suggest_routes("x", "y")
            .into_iter()
            .map(|s| s.route_id)
            .collect();
        assert_eq!(ids, vec!["C", "B", "A"]);
    }

    #[test]
    fn test_distance_between_demo_stops() {
        let catalog = Catalog::demo();
        let a = catalog.stop("stop1").unwrap();
        let b = catalog.stop("stop2").unwrap();
        let d = distance_km(a.latitude, a.longitude, b.latitude, b.longitude);
        // Central Station to Downtown Terminal is roughly 5.4 km as the crow flies
        assert!(d > 5.0 && d < 6.0, "got {} km", d);
        assert_eq!(distance_km(a.latitude, a.longitude, a.latitude, a.longitude), 0.0);
    }

    #[test]
    fn test_fleet_references_known_routes_and_stops() {
        let catalog = Catalog::demo();
        for bus in demo_fleet() {
            let route = catalog.routes().iter().find(|r| r.id == bus.route_id);
            assert!(route.is_some(), "{} runs an unknown route", bus.id);
            if let Some(next) = &bus.next_stop_id {
                assert!(catalog.stop(next).is_some());
                assert!(route.unwrap().serves(next));
            }
        }
    }
}
