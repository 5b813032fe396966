//! `bg-daemon` (C9): the Axum HTTP facade over `/api/v1`, plus the worker
//! dispatcher loop that drains the task queue. `main.rs` wires the two
//! together into one binary; router tests under `tests/` build the router
//! directly from this crate without going through a binary at all.

pub mod api_types;
pub mod dispatch;
pub mod errors;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
