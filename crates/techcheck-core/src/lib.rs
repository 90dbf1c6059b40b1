// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// TechCheck — Core types, error definitions, and configuration shared across
// all crates.

pub mod config;
pub mod error;
pub mod human_errors;
pub mod integrity;
pub mod types;

pub use config::TechcheckConfig;
pub use error::TechcheckError;
pub use types::*;
