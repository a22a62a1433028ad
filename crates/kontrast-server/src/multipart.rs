// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// multipart/form-data parsing (RFC 7578) for the upload form.
//
// The body is a sequence of parts separated by `--<boundary>` lines and
// terminated by `--<boundary>--`:
//
// ```text
// --boundary\r\n
// Content-Disposition: form-data; name="image"; filename="a.png"\r\n
// Content-Type: image/png\r\n
// \r\n
// <bytes>\r\n
// --boundary\r\n
// Content-Disposition: form-data; name="method"\r\n
// \r\n
// CLAHE\r\n
// --boundary--\r\n
// ```

use tracing::debug;

use kontrast_core::error::{KontrastError, Result};

use crate::http::find_subsequence;

/// One part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    /// The `name` parameter of `Content-Disposition`.
    pub name: String,
    /// The `filename` parameter; present (possibly empty) for file inputs.
    pub filename: Option<String>,
    /// The part's own `Content-Type`, if given.
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// All parts of a submitted form, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    parts: Vec<FormPart>,
}

impl FormData {
    /// Parse a body whose `Content-Type` header is `content_type`.
    ///
    /// Fails with `MalformedRequest` if the header is not
    /// `multipart/form-data` with a boundary, or the body does not follow
    /// the boundary structure.
    pub fn parse(content_type: &str, body: &[u8]) -> Result<Self> {
        let boundary = boundary(content_type).ok_or_else(|| {
            KontrastError::MalformedRequest(format!("not a multipart form: {content_type:?}"))
        })?;
        let parts = parse_parts(boundary, body)?;
        debug!(parts = parts.len(), "multipart form parsed");
        Ok(Self { parts })
    }

    /// First file input named `name` (a part carrying a `filename`).
    pub fn file(&self, name: &str) -> Option<&FormPart> {
        self.parts
            .iter()
            .find(|part| part.name == name && part.filename.is_some())
    }

    /// First plain field named `name`, decoded as UTF-8.
    pub fn text(&self, name: &str) -> Option<String> {
        self.parts
            .iter()
            .find(|part| part.name == name && part.filename.is_none())
            .map(|part| String::from_utf8_lossy(&part.data).into_owned())
    }
}

/// Extract the boundary from a `multipart/form-data` content type.
pub fn boundary(content_type: &str) -> Option<&str> {
    let mut params = content_type.split(';');
    let mime = params.next()?.trim();
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    params
        .filter_map(|param| param.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
}

fn parse_parts(boundary: &str, body: &[u8]) -> Result<Vec<FormPart>> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    // Every delimiter after the first is preceded by a line break.
    let next_delimiter = [b"\r\n".as_slice(), delimiter].concat();

    let mut pos = find_subsequence(body, delimiter)
        .ok_or_else(|| KontrastError::MalformedRequest("multipart boundary not found".into()))?
        + delimiter.len();

    let mut parts = Vec::new();
    loop {
        let rest = &body[pos..];
        if rest.starts_with(b"--") {
            break;
        }
        if !rest.starts_with(b"\r\n") {
            return Err(KontrastError::MalformedRequest(
                "expected line break after boundary".into(),
            ));
        }
        pos += 2;

        let header_len = find_subsequence(&body[pos..], b"\r\n\r\n").ok_or_else(|| {
            KontrastError::MalformedRequest("unterminated part headers".into())
        })?;
        let headers = std::str::from_utf8(&body[pos..pos + header_len])
            .map_err(|_| KontrastError::MalformedRequest("part headers are not UTF-8".into()))?;
        let data_start = pos + header_len + 4;

        let data_len = find_subsequence(&body[data_start..], &next_delimiter).ok_or_else(|| {
            KontrastError::MalformedRequest("missing closing boundary".into())
        })?;
        let data = body[data_start..data_start + data_len].to_vec();
        pos = data_start + data_len + next_delimiter.len();

        parts.push(part_from_headers(headers, data)?);
    }

    Ok(parts)
}

fn part_from_headers(headers: &str, data: Vec<u8>) -> Result<FormPart> {
    let mut name = None;
    let mut filename = None;
    let mut content_type = None;

    for line in headers.split("\r\n") {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case("content-disposition") {
            for param in value.split(';').skip(1) {
                if let Some((pkey, pvalue)) = param.trim().split_once('=') {
                    let pvalue = pvalue.trim().trim_matches('"').to_string();
                    match pkey.trim().to_ascii_lowercase().as_str() {
                        "name" => name = Some(pvalue),
                        "filename" => filename = Some(pvalue),
                        _ => {}
                    }
                }
            }
        } else if key.eq_ignore_ascii_case("content-type") {
            content_type = Some(value.trim().to_string());
        }
    }

    let name = name.ok_or_else(|| {
        KontrastError::MalformedRequest("part without a Content-Disposition name".into())
    })?;

    Ok(FormPart {
        name,
        filename,
        content_type,
        data,
    })
}
