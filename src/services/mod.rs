/// Per-room match orchestration and the tick loop.
pub mod battle_service;
/// Pacing model for simulated competitors.
pub mod bot_pacing;
/// OpenAPI documentation generation.
pub mod documentation;
/// Percentile elimination cuts.
pub mod elimination;
/// Outbound event fan-out to room members.
pub mod events;
/// Health check service.
pub mod health_service;
/// Rank and leaderboard computation.
pub mod placement;
/// Room lifecycle and membership management.
pub mod room_service;
/// Idle room and token housekeeping.
pub mod room_sweeper;
/// Reconnect token issuance and redemption.
pub mod session_registry;
/// Score-progress reconciliation.
pub mod sync;
/// WebSocket connection and message handling service.
pub mod websocket_service;
