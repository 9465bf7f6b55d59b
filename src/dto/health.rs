use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status, always "ok" while the process serves traffic.
    pub status: String,
    /// Number of live rooms.
    pub rooms: usize,
    /// Number of connected sessions.
    pub sessions: usize,
}

impl HealthResponse {
    /// Create a health response with current registry counts.
    pub fn ok(rooms: usize, sessions: usize) -> Self {
        Self {
            status: "ok".to_string(),
            rooms,
            sessions,
        }
    }
}
