//! Kubernetes access for the watcher.
//!
//! This module owns everything that talks to the API server: building the
//! client and turning watch streams into policy lifecycle events.

pub mod client;
pub mod source;
