//! Application state shared across handlers.

/// Shared application state for the health/readiness surface. The engine's
/// own state (offsets, locks, producers) lives entirely in the background
/// consume loop; the API layer only reads the process-wide telemetry
/// singletons.
#[derive(Clone, Default)]
pub struct AppState;
