pub mod config_store;
pub mod fs_atomic;
pub mod stores;
