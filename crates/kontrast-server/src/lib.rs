// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Kontrast Server — the upload web layer. A small HTTP/1.1 server on raw
// Tokio TCP that accepts an image and a method, runs the enhancer and
// serves the stored results.

pub mod http;
pub mod multipart;
pub mod pages;
pub mod routes;
pub mod server;
pub mod storage;

pub use routes::AppState;
pub use server::EnhanceServer;
pub use storage::ArtifactStore;
