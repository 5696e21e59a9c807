//! Serverless functions behind the ItemValue app.
//!
//! Each binary under `api/` wraps one handler in [`handlers`]. The handlers
//! are plain async functions over an in-memory request, so they can be driven
//! directly in tests against mocked upstreams.

pub mod access_code;
pub mod completion;
pub mod config;
pub mod emails;
pub mod error;
pub mod handlers;
pub mod http;
pub mod logging;
pub mod market;
pub mod runtime;
pub mod services;
pub mod tiers;

pub use config::Config;
pub use error::{Error, Result};
