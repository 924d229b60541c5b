//! Extension -> MIME type inference against a fixed table.

use std::path::Path;

/// A MIME type recognized by the cache builder. Kept as an enum for `O(1)`
/// indexed lookup rather than a runtime `HashMap`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MimeType {
    Css,
    Docx,
    Html,
    Ico,
    Jpeg,
    Js,
    Md,
    Png,
    Svg,
    Webmanifest,
    Xml,
    OctetStream,
}

impl MimeType {
    pub fn as_str(self) -> &'static str {
        match self {
            MimeType::Css => "text/css",
            MimeType::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            MimeType::Html => "text/html; charset=UTF-8",
            MimeType::Ico => "image/x-icon",
            MimeType::Jpeg => "image/jpeg",
            MimeType::Js => "application/javascript",
            MimeType::Md => "text/markdown",
            MimeType::Png => "image/png",
            MimeType::Svg => "image/svg+xml",
            MimeType::Webmanifest => "application/manifest+json",
            MimeType::Xml => "text/xml",
            MimeType::OctetStream => "application/octet-stream",
        }
    }
}

/// Infer a MIME type from the case-insensitive suffix after the last `.` in
/// `path`. Files with no extension, or an extension absent from the table,
/// fall back to `application/octet-stream`.
pub fn infer(path: &str) -> MimeType {
    match Path::new(path).extension().and_then(|s| s.to_str()) {
        Some(ext) => match ext.to_ascii_lowercase().as_str() {
            "css" => MimeType::Css,
            "docx" => MimeType::Docx,
            "html" => MimeType::Html,
            "ico" => MimeType::Ico,
            "jpg" | "jpeg" => MimeType::Jpeg,
            "js" => MimeType::Js,
            "md" => MimeType::Md,
            "png" => MimeType::Png,
            "svg" => MimeType::Svg,
            "webmanifest" => MimeType::Webmanifest,
            "xml" => MimeType::Xml,
            _ => MimeType::OctetStream,
        },
        None => MimeType::OctetStream,
    }
}

/// Public string-returning convenience wrapper, kept for callers (and tests)
/// that only want the MIME string.
pub fn infer_str(path: &str) -> &'static str {
    infer(path).as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_round_trip() {
        assert_eq!(infer_str("style.css"), "text/css");
        assert_eq!(infer_str("report.docx"), "application/vnd.openxmlformats-officedocument.wordprocessingml.document");
        assert_eq!(infer_str("index.html"), "text/html; charset=UTF-8");
        assert_eq!(infer_str("favicon.ico"), "image/x-icon");
        assert_eq!(infer_str("photo.jpg"), "image/jpeg");
        assert_eq!(infer_str("photo.jpeg"), "image/jpeg");
        assert_eq!(infer_str("app.js"), "application/javascript");
        assert_eq!(infer_str("readme.md"), "text/markdown");
        assert_eq!(infer_str("logo.png"), "image/png");
        assert_eq!(infer_str("icon.svg"), "image/svg+xml");
        assert_eq!(infer_str("site.webmanifest"), "application/manifest+json");
        assert_eq!(infer_str("data.xml"), "text/xml");
    }

    #[test]
    fn table_is_case_insensitive() {
        assert_eq!(infer_str("STYLE.CSS"), "text/css");
        assert_eq!(infer_str("INDEX.HTML"), "text/html; charset=UTF-8");
        assert_eq!(infer_str("Photo.JPG"), "image/jpeg");
    }

    #[test]
    fn unknown_and_missing_extension_fall_back() {
        assert_eq!(infer_str("data.bin"), "application/octet-stream");
        assert_eq!(infer_str("Makefile"), "application/octet-stream");
        assert_eq!(infer_str("archive.tar.gz"), "application/octet-stream");
    }
}
