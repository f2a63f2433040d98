// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! gotestiful library
//!
//! This module exports the building blocks of the `gotestiful` binary for use
//! in integration tests and as a library: configuration, package resolution,
//! subprocess streaming, the webhook notifier and run orchestration.

pub mod config;
pub mod notifier;
pub mod packages;
pub mod run;
pub mod runner;
pub mod settings;

pub use config::{Config, RunConfig};
pub use run::{TestsFailed, run_tests};
pub use settings::Settings;
