//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! configured "host:port"
//!     → ListenAddress::parse (module construction, no socket yet)
//!     → ListenAddress::bind (start hook)
//!     → TcpListener handed to the HTTP server's serve loop
//! ```

pub mod listener;

pub use listener::{ListenAddress, ListenerError};
