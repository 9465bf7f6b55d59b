use crate::{dto::health::HealthResponse, state::SharedState};

/// Respond with a health payload carrying live registry counts.
pub fn health_status(state: &SharedState) -> HealthResponse {
    HealthResponse::ok(state.rooms().len(), state.sessions().len())
}
