use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Eigenmac Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::dto::room::RoomSnapshot,
            crate::dto::room::YouSnapshot,
            crate::dto::room::ParticipantSummary,
            crate::dto::room::ChatMessage,
            crate::dto::room::LeaderboardEntry,
            crate::dto::room::PublicRoomSummary,
            crate::state::room::Settings,
            crate::state::room::RoomMode,
            crate::state::room::Difficulty,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "WebSocket operations for game clients"),
    )
)]
pub struct ApiDoc;
