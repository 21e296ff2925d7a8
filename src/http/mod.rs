//! HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! Module construction:
//!     server.rs / api.rs (validate address, no socket)
//!     → router.rs (ServeMux / RouteGroup handles)
//!     → feature modules register routes on the handles
//!
//! Start hook:
//!     groups assembled into one Router + middleware
//!     → bind → serve loop on its own task
//!
//! Request:
//!     middleware → handler → ApiError (error.rs) or Envelope (response.rs)
//! ```

pub mod api;
pub mod error;
pub mod response;
pub mod router;
pub mod server;

pub use api::ApiServer;
pub use error::ApiError;
pub use response::Envelope;
pub use router::{RouteError, RouteGroup, ServeMux, API_V1, SWAGGER};
pub use server::{HttpServer, ServerError};
