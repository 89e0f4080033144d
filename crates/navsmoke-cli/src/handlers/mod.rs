//! Command handlers - extracted from main.rs for testability

pub mod config;
pub mod list;

pub use config::{execute_config, render_config};
pub use list::{execute_list, render_list};
