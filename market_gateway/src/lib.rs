pub mod auth;
pub mod errors;
pub mod models;
pub mod providers;
pub mod rate_limit;
pub mod resolver;
