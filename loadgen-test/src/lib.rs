//! Test utilities for the load generator.
//!
//! This crate provides utilities to facilitate testing the load generator against a scheduler.
//! See the modules for all available utilities.

pub mod server;
pub mod tracing;
