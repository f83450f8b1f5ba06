//! # qx-core
//!
//! Shared types and utilities for the QX order-processing pipeline.
//!
//! This crate provides the foundational building blocks used across the
//! workspace: fixed-point prices, signed quantities, nanosecond timestamps,
//! quote and order definitions, layered configuration, and the logging
//! framework.

pub mod config;
pub mod logging;
pub mod types;
