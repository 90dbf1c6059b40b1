// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// techcheck-jobs — Validation job lifecycle for TechCheck.
//
// The pipeline chains extraction, classification, evaluation and annotation;
// the Job Manager runs it on a bounded pool of blocking workers and owns the
// state of every submitted job until it is evicted.

pub mod manager;
pub mod pipeline;

pub use manager::JobManager;
pub use pipeline::{Pipeline, PipelineOutput};
