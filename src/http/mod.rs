//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, handler)
//!     → request.rs (drain body, snapshot request into a record)
//!     → observability (info or error logger)
//!     → 204 / 500, empty body
//! ```

pub mod request;
pub mod server;

pub use request::{ExtractError, RequestRecord, RequestUrl};
pub use server::{handle, AppState, HttpServer};
