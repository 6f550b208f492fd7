//! Upload validation helpers: the image allow-list, the size limit and
//! stored-name generation.

use chrono::Utc;
use std::path::Path;
use uuid::Uuid;

/// Largest accepted image payload (10 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// The image formats the gallery accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageKind {
    /// Match a declared media type such as `image/png`.
    ///
    /// Parameters (`; charset=...`) are ignored and the comparison is
    /// case-insensitive.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Match a file extension without the leading dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Canonical media type used when serving a stored file.
    pub fn media_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }
}

/// The accepted extension of an uploaded file, lower-cased.
///
/// Both the original file name and the declared media type must be on the
/// allow-list; a spoofed extension with a foreign media type (or the other
/// way round) is rejected. Returns `None` on any mismatch.
pub fn accepted_extension(file_name: Option<&str>, media_type: Option<&str>) -> Option<String> {
    let ext = file_name
        .map(Path::new)
        .and_then(Path::extension)
        .and_then(|ext| ext.to_str())?
        .to_ascii_lowercase();
    ImageKind::from_extension(&ext)?;
    ImageKind::from_media_type(media_type?)?;
    Some(ext)
}

/// Generate a stored file name: `<unix-millis>-<random>.<ext>`.
pub fn generate_filename(ext: &str) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}-{}.{}", Utc::now().timestamp_millis(), &random[..12], ext)
}

/// Reject names that could escape the uploads directory.
pub fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains("..")
        && !name
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'/' || b == b'\\')
}
