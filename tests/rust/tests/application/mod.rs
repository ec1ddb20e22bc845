//! Application service tests
//!
//! Tests for the core application services that orchestrate kubeconfig
//! handling, connection tracking and registration with event emission.

mod connection_app_service;
mod discovery_service;
