//! Client for the broker's local REST gateway.

pub mod client;
pub mod params;
pub mod response;
