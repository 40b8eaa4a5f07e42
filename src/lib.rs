//! alarm-sync: mirrors alarm panel status emails onto a camera platform.

pub mod actuator;
pub mod bridge;
pub mod config;
pub mod error;
pub mod logging;
pub mod mail;
