//! Canonical types shared by every part of the adapter.

pub mod config;
pub mod message;
pub mod prompt;
pub mod request;
pub mod result;
pub mod streaming;

pub use config::*;
pub use message::*;
pub use prompt::*;
pub use request::*;
pub use result::*;
pub use streaming::*;
