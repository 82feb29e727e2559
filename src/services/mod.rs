/// Host role resolution and seeding.
pub mod access;
/// Change-feed follower sending new answers to the cheat oracle.
pub mod answer_watch;
/// Draft editing.
pub mod authoring_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
pub mod jolly;
/// Monthly leaderboard queries and reset.
pub mod leaderboard_service;
/// Joining, per-participant views and answer submission.
pub mod participant_service;
/// Pure scoring rules.
pub mod scoring;
/// Session lifecycle driven by the host.
pub mod session_service;
/// Rules and bonus settings.
pub mod settings_service;
/// Question settlement and the end-of-session leaderboard merge.
pub mod settlement;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events subscription and streaming.
pub mod sse_service;
/// Storage connection supervisor with reconnect backoff.
pub mod storage_supervisor;
