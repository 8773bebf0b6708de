pub mod actions;
pub mod cli;
pub mod config;
pub mod delete;
pub mod error;
pub mod inventory;
pub mod logging;
pub mod notify;
pub mod platform;
pub mod report;
pub mod scan;
pub mod util;
pub mod vault;
