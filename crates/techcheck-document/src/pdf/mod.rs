// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — loading and page-tree access (lopdf) and summary page
// rendering (printpdf).

pub mod reader;
pub mod writer;

pub use reader::{PdfError, PdfReader};
pub use writer::SummaryWriter;
