pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod notifier;
pub mod reading_cache;
pub mod telemetry;

#[cfg(test)]
mod testing;
