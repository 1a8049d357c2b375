pub mod access_log;
pub mod auth_extractor;
pub mod client_ip;
pub mod concurrency;
pub mod exception_shield;
pub mod ip_filter_layer;
pub mod rate_limit;
