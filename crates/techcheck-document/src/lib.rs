// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// techcheck-document — Document processing for the TechCheck validator.
//
// Provides layout extraction (text runs, fonts, margins) from PDF content
// streams, page role classification, and the annotator that overlays
// findings onto a copy of the original PDF.

pub mod annotate;
pub mod classify;
pub mod extract;
pub mod pdf;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use annotate::Annotator;
pub use classify::PageClassifier;
pub use extract::Extractor;
pub use pdf::reader::PdfReader;
pub use pdf::writer::SummaryWriter;
