// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTML pages: the upload form and the before/after result view.

use std::fmt::Write as _;

use kontrast_core::{ArtifactKind, Method, StoredArtifacts};

const STYLE: &str = "body{font-family:sans-serif;max-width:1100px;margin:2em auto;padding:0 1em}\
figure{display:inline-block;margin:0 1em 1em 0;vertical-align:top}\
img{max-width:520px;border:1px solid #ccc}";

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{body}</body>\n</html>\n"
    )
}

/// The upload form: one `image` file input and a `method` selector.
pub fn upload_page() -> String {
    let mut options = String::new();
    for method in Method::ALL {
        let selected = if method == Method::default() { " selected" } else { "" };
        let _ = writeln!(
            options,
            "<option value=\"{}\"{selected}>{}</option>",
            method.as_str(),
            html_escape(method.label())
        );
    }

    let body = format!(
        "<h1>Kontrast</h1>\n\
         <form action=\"/upload\" method=\"post\" enctype=\"multipart/form-data\">\n\
         <p><input type=\"file\" name=\"image\" accept=\"image/*\"></p>\n\
         <p><label>Method <select name=\"method\">\n{options}</select></label></p>\n\
         <p><button type=\"submit\">Enhance</button></p>\n\
         </form>\n"
    );
    page("Kontrast", &body)
}

/// Result view showing both images, both histograms and the method used.
pub fn result_page(stored: &StoredArtifacts) -> String {
    let figure = |kind: ArtifactKind, name: &str, caption: &str| {
        format!(
            "<figure><img src=\"{}{}\" alt=\"{caption}\"><figcaption>{caption}</figcaption></figure>\n",
            kind.url_prefix(),
            html_escape(name)
        )
    };

    let mut body = format!(
        "<h1>Kontrast</h1>\n<p>Method: <strong>{}</strong> ({})</p>\n",
        html_escape(stored.method.label()),
        stored.method.as_str()
    );
    body.push_str(&figure(ArtifactKind::Upload, &stored.original, "Original"));
    body.push_str(&figure(ArtifactKind::Processed, &stored.processed, "Processed"));
    body.push_str("<br>\n");
    body.push_str(&figure(
        ArtifactKind::Histogram,
        &stored.hist_original,
        "Original histogram",
    ));
    body.push_str(&figure(
        ArtifactKind::Histogram,
        &stored.hist_processed,
        "Processed histogram",
    ));
    body.push_str("<p><a href=\"/\">Enhance another image</a></p>\n");

    page("Kontrast result", &body)
}

/// Escape text for use in HTML content and double-quoted attributes.
pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
