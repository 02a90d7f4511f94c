pub mod metrics;
pub mod sensitivity;
