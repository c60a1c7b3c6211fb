//! Storage key generation and MIME detection.

use chrono::{DateTime, Datelike, Utc};
use uuid::Uuid;

/// MIME type used when the extension is unknown.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Build a fresh blob key `{owner}/{yyyy}/{mm}/{dd}/{uuid}`.
///
/// Keys are never reused; grouping by day keeps prefixes prunable.
pub fn generate_storage_key(owner_id: Uuid, now: DateTime<Utc>) -> String {
    format!(
        "{owner_id}/{:04}/{:02}/{:02}/{}",
        now.year(),
        now.month(),
        now.day(),
        Uuid::new_v4()
    )
}

/// Guess a MIME type from a file name's extension.
pub fn mime_from_name(name: &str) -> &'static str {
    let Some((stem, ext)) = name.rsplit_once('.') else {
        return DEFAULT_MIME_TYPE;
    };
    if stem.is_empty() {
        return DEFAULT_MIME_TYPE;
    }
    match ext.to_ascii_lowercase().as_str() {
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "js" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" | "gzip" => "application/gzip",
        "tar" => "application/x-tar",
        "7z" => "application/x-7z-compressed",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "wav" => "audio/wav",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        _ => DEFAULT_MIME_TYPE,
    }
}
