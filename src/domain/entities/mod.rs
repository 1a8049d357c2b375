pub mod direct_transfer;
pub mod file_info;
pub mod http_range;
pub mod permission;
pub mod rule;
pub mod share;
pub mod user;
