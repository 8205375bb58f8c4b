//! `/health` endpoint.

use std::time::Instant;

use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Live WebSocket connections.
    pub connections: usize,
    /// Registered points.
    pub points: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize, points: usize) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_counters() {
        let resp = health_check(Instant::now(), 3, 1);
        assert_eq!(resp.status, "ok");
        assert_eq!(resp.connections, 3);
        assert_eq!(resp.points, 1);
        assert!(resp.uptime_secs < 5);
    }

    #[test]
    fn serializes_snake_case_fields() {
        let json = serde_json::to_value(health_check(Instant::now(), 0, 0)).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json.get("uptime_secs").is_some());
        assert!(json.get("points").is_some());
    }
}
