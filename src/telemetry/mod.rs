pub mod alerts;
pub mod service;

pub use service::TelemetryService;
