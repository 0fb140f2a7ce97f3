pub mod allowlist;
pub mod client_ip;
pub mod client_state;
pub mod config;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod server;
pub mod stats;
pub mod token_bucket;

pub use config::{Config, GuardConfig, GuardOptions};
pub use error::{GuardError, Result};
pub use guard::{DdosGuard, Decision};
pub use server::{create_app, Server};
