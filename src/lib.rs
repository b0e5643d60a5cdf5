//! Library exports for the lensgrab capture engine.
//!
//! Exposes the capture orchestration together with the configuration types so
//! that other front ends (hotkey daemons, editors) can drive captures with the
//! same settings and destinations as the command line tool.

pub mod capture;
pub mod config;
pub mod notification;

pub use config::Config;
