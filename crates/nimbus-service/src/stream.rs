//! HTTP byte-range handling.
//!
//! Only a single range is served. Anything else that is not well formed,
//! including multi-range requests, is treated as unsatisfiable rather than
//! ignored.

use nimbus_core::traits::ByteStream;
use nimbus_entity::file::File;

/// An inclusive byte range within a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte offset.
    pub start: u64,
    /// Last byte offset (inclusive).
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Ranges always cover at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// `Content-Range` header value for a resource of `total` bytes.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

/// Outcome of interpreting a `Range` header against a resource length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    /// No range requested: serve everything.
    Full,
    /// Serve this range with 206.
    Partial(ByteRange),
    /// Answer 416.
    Unsatisfiable,
}

/// Interpret a `Range` header for a resource of `total` bytes.
///
/// Supports `bytes=start-end`, `bytes=start-` and `bytes=-suffix`. The end
/// is clamped to `total - 1`.
pub fn parse_range(header: Option<&str>, total: u64) -> RangeRequest {
    let Some(header) = header else {
        return RangeRequest::Full;
    };
    match parse_single_range(header.trim(), total) {
        Some(range) => RangeRequest::Partial(range),
        None => RangeRequest::Unsatisfiable,
    }
}

fn parse_single_range(header: &str, total: u64) -> Option<ByteRange> {
    let ranges = header.strip_prefix("bytes=")?.trim();
    if ranges.contains(',') || total == 0 {
        return None;
    }
    let (first, last) = ranges.split_once('-')?;
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        // Suffix range: bytes=-500 means the last 500 bytes.
        let suffix: u64 = last.parse().ok()?;
        if suffix == 0 {
            return None;
        }
        return Some(ByteRange {
            start: total.saturating_sub(suffix),
            end: total - 1,
        });
    }

    let start: u64 = first.parse().ok()?;
    let end = if last.is_empty() {
        total - 1
    } else {
        last.parse::<u64>().ok()?.min(total - 1)
    };

    if start >= total || start > end {
        return None;
    }
    Some(ByteRange { start, end })
}

/// File content opened for streaming.
pub enum StreamBody {
    /// The whole file.
    Complete {
        /// The file being served.
        file: File,
        /// Its bytes.
        body: ByteStream,
    },
    /// One range of the file.
    Partial {
        /// The file being served.
        file: File,
        /// The range served.
        range: ByteRange,
        /// Bytes of the range only.
        body: ByteStream,
    },
    /// The requested range cannot be served.
    Unsatisfiable {
        /// Length of the file.
        total: u64,
    },
}

impl std::fmt::Debug for StreamBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete { file, .. } => f.debug_struct("Complete").field("file", &file.id).finish(),
            Self::Partial { file, range, .. } => f
                .debug_struct("Partial")
                .field("file", &file.id)
                .field("range", range)
                .finish(),
            Self::Unsatisfiable { total } => {
                f.debug_struct("Unsatisfiable").field("total", total).finish()
            }
        }
    }
}
