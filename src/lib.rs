pub mod actors;
pub mod alerts;
#[cfg(feature = "api")]
pub mod api;
pub mod commands;
pub mod config;
pub mod monitors;
pub mod notify;
pub mod storage;
pub mod util;
