//! HTTP API handlers

pub mod deferred;
pub mod health;
pub mod logs;
pub mod prompts;
pub mod settings;
pub mod submissions;

pub use deferred::deferred_routes;
pub use health::health_routes;
pub use logs::log_routes;
pub use prompts::prompt_routes;
pub use settings::settings_routes;
pub use submissions::submission_routes;
