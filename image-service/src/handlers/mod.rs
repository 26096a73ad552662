//! HTTP handlers for image-service.

pub mod health;
pub mod metrics;
pub mod process;

pub use self::health::{health_check, readiness_check, root};
pub use self::metrics::metrics_endpoint;
pub use self::process::process_image;
