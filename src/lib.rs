pub mod application;
pub mod common;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
