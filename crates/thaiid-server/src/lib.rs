//! Websocket service that pushes Thai ID card events to every connected client

pub mod config;
pub mod hub;
pub mod relay;
pub mod routes;
pub mod ws;

pub use config::ServiceConfig;
pub use hub::{Hub, HubError};
pub use routes::{build_router, AppState};
