//! Test utilities for use-case and HTTP testing.
//!
//! This module provides:
//! - Test data factories for creating valid test fixtures
//! - An in-memory store implementing every billing repository
//! - A recording payment gateway with scripted failures
//! - An `AppState` builder for router-level tests

mod app_state_builder;
mod billing_mocks;
mod factories;
mod gateway_mocks;

pub use app_state_builder::*;
pub use billing_mocks::*;
pub use factories::*;
pub use gateway_mocks::*;
