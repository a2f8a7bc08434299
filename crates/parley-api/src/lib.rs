//! Parley API crate - axum HTTP server, audio clip serving, and the
//! WebSocket transport that carries one voice session per connection.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod socket;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::{AppState, FixedSessionFactory, LiveSessionFactory, SessionFactory};
