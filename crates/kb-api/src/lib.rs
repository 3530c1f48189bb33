//! # kb-api
//!
//! REST API server for Knowledge Warden.
//!
//! This crate exposes knowledge record CRUD, the search endpoints, batch
//! knowledge-type edits and image storage over HTTP.

pub mod dto;
pub mod error;
pub mod middleware;
pub mod params;
pub mod routes;
pub mod server;
pub mod state;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use error::ApiError;
pub use server::{ApiServer, ApiServerConfig};
pub use state::AppState;
