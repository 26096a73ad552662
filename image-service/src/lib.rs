//! Synthetic image processing service with graceful shutdown for
//! preemptible instances.

pub mod config;
pub mod handlers;
pub mod lifecycle;
pub mod services;
pub mod simulation;
pub mod startup;

pub use startup::{build_router, AppState, Application};
