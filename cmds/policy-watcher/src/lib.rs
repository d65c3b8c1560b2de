pub mod config;
pub mod k8s;
pub mod telemetry;
pub mod watch;
