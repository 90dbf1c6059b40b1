// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document fingerprints — SHA-256 of the submitted bytes.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of a submitted document. Identical uploads share a
/// fingerprint, which ties a job, its extracted `Document` and its report
/// together.
pub fn fingerprint(document: &[u8]) -> String {
    hex::encode(Sha256::digest(document))
}

/// First twelve hex digits, enough to tell uploads apart in logs.
pub fn short_fingerprint(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}
