//! Route handlers
//!
//! - [`relay`]: `/stream` and `/batch`
//! - [`system`]: health and OpenAPI
//! - [`demo`]: built-in demo upstream

mod demo;
mod relay;
mod system;

pub use demo::*;
pub use relay::*;
pub use system::*;
