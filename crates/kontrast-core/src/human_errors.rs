// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Client-facing error messages.
//
// Every error is mapped to an HTTP status and a short message that is safe to
// show in a browser. Internal detail (paths, decoder output) stays in the
// logs.

use crate::error::KontrastError;

/// Who is at fault, from the client's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The request was wrong; resending it unchanged will fail again.
    ClientError,
    /// Something broke on our side; the same request may succeed later.
    ServerError,
}

/// A client-facing error with HTTP status and plain message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HumanError {
    /// HTTP status code.
    pub status: u16,
    /// Message returned in the JSON `error` field.
    pub message: String,
    pub severity: Severity,
}

impl HumanError {
    fn client(status: u16, message: &str) -> Self {
        Self {
            status,
            message: message.into(),
            severity: Severity::ClientError,
        }
    }

    fn server(message: &str) -> Self {
        Self {
            status: 500,
            message: message.into(),
            severity: Severity::ServerError,
        }
    }
}

/// Convert a `KontrastError` into the status and message sent to the client.
pub fn humanize_error(err: &KontrastError) -> HumanError {
    match err {
        // -- Upload errors --
        KontrastError::MissingFile => HumanError::client(400, "No image file"),
        KontrastError::EmptySelection => HumanError::client(400, "No selected file"),
        KontrastError::InvalidMethod(_) => HumanError::client(400, "Invalid enhancement method."),

        // -- Image errors --
        KontrastError::Decode(_) => HumanError::client(400, "Failed to load image."),
        KontrastError::Encode(_) => HumanError::server("Failed to save processed image."),

        // -- HTTP errors --
        KontrastError::MalformedRequest(_) => HumanError::client(400, "Malformed request."),
        KontrastError::PayloadTooLarge { .. } => HumanError::client(413, "Upload too large."),
        KontrastError::NotFound(_) => HumanError::client(404, "Not found."),

        KontrastError::Server(_)
        | KontrastError::Config(_)
        | KontrastError::Serialization(_) => HumanError::server("Internal server error."),

        KontrastError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError::client(404, "Not found.")
            } else {
                HumanError::server("Internal server error.")
            }
        }
    }
}
