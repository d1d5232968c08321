//! Configuration access port trait.
//!
//! Implemented by [`crate::adapters::file_config_adapter::FileConfigAdapter`];
//! read once at startup by the CLI and checked by
//! [`crate::domain::config_validation`].

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
}
