//! Ragway server: axum routes and shared state around the gateway.

pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
