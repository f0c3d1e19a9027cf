pub mod k8s;
pub mod telemetry;

pub use k8s::*;
pub use telemetry::*;
