//! HTTP request handlers.

pub mod health;
pub mod push;

pub use health::*;
pub use push::*;
