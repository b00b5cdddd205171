pub mod account;
pub mod bar;
pub mod bar_series;
pub mod contract;
pub mod order;
pub mod request_params;
pub mod timeframe;
