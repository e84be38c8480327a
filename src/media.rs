//! Declared media types, derived from file names

use std::fmt;
use std::path::Path;

/// A declared media type such as `image/png`.
///
/// Mirrors what a browser reports as `File.type`: it comes from the file
/// extension, not from sniffing the content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType(String);

impl MediaType {
    pub const IMAGE_PREFIX: &'static str = "image/";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn png() -> Self {
        Self::new("image/png")
    }

    pub fn jpeg() -> Self {
        Self::new("image/jpeg")
    }

    pub fn gif() -> Self {
        Self::new("image/gif")
    }

    pub fn bmp() -> Self {
        Self::new("image/bmp")
    }

    pub fn octet_stream() -> Self {
        Self::new("application/octet-stream")
    }

    /// Detect media type from a file name's extension
    pub fn from_name(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase());

        let value = match ext.as_deref() {
            Some("png") => "image/png",
            Some("jpg" | "jpeg" | "jfif") => "image/jpeg",
            Some("gif") => "image/gif",
            Some("bmp") => "image/bmp",
            Some("webp") => "image/webp",
            Some("avif") => "image/avif",
            Some("tif" | "tiff") => "image/tiff",
            Some("svg") => "image/svg+xml",
            Some("ico") => "image/x-icon",
            Some("heic") => "image/heic",
            Some("txt") => "text/plain",
            Some("csv") => "text/csv",
            Some("json") => "application/json",
            Some("pdf") => "application/pdf",
            Some("zip") => "application/zip",
            Some("mp4" | "m4v") => "video/mp4",
            Some("mov") => "video/quicktime",
            _ => return Self::octet_stream(),
        };
        Self::new(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact match only; `image/apng` is not PNG here.
    pub fn is_png(&self) -> bool {
        self.0 == "image/png"
    }

    pub fn is_jpeg(&self) -> bool {
        self.0 == "image/jpeg"
    }

    pub fn is_image(&self) -> bool {
        self.0.starts_with(Self::IMAGE_PREFIX)
    }

    /// Preferred file extension when a file is rewritten in this type
    pub fn extension(&self) -> Option<&'static str> {
        match self.0.as_str() {
            "image/jpeg" => Some("jpg"),
            "image/png" => Some("png"),
            "image/gif" => Some("gif"),
            "image/bmp" => Some("bmp"),
            "image/webp" => Some("webp"),
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Swap the extension of a bare file name, appending one if missing.
///
/// A leading dot is part of the stem, so `.png` becomes `.png.jpg`.
pub fn replace_extension(name: &str, ext: &str) -> String {
    Path::new(name)
        .with_extension(ext)
        .to_string_lossy()
        .into_owned()
}
