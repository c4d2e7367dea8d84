//! Filename utilities for converted outputs and downloads.
//!
//! Converted files keep their original name with only the final extension
//! swapped. Anything written to disk or into an archive goes through
//! [`sanitize_filename`] first.

use regex::Regex;
use std::sync::LazyLock;

/// Longest sanitized filename, in bytes.
pub const MAX_FILENAME_BYTES: usize = 200;

/// Characters that are invalid in common filesystems, plus ASCII control codes.
static INVALID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1F]"#).expect("valid regex"));

static REPEATED_UNDERSCORES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_{2,}").expect("valid regex"));

static REPEATED_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid regex"));

/// Split a filename into stem and extension at the final dot.
///
/// A leading dot does not start an extension (`.env` has none).
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

/// Replace the final extension of `name` with `extension`.
///
/// Multi-dot names keep every segment but the last. Names without an
/// extension get one appended.
///
/// # Examples
///
/// ```
/// use convertforge_common::paths::converted_filename;
///
/// assert_eq!(converted_filename("my.file.name.jpg", "png"), "my.file.name.png");
/// assert_eq!(converted_filename("README", "pdf"), "README.pdf");
/// ```
pub fn converted_filename(name: &str, extension: &str) -> String {
    let extension = extension.trim_start_matches('.');
    let (stem, _) = split_extension(name);
    format!("{stem}.{extension}")
}

/// Make a filename safe for archives and filesystems.
///
/// Invalid characters become `_`, runs of underscores or whitespace collapse,
/// leading/trailing dots and spaces are trimmed, and the result is capped at
/// [`MAX_FILENAME_BYTES`] while keeping the extension. An empty result becomes
/// `file`.
///
/// # Examples
///
/// ```
/// use convertforge_common::paths::sanitize_filename;
///
/// assert_eq!(sanitize_filename("a<b>:c.png"), "a_b_c.png");
/// assert_eq!(sanitize_filename("  ..  "), "file");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    let replaced = INVALID_CHARS.replace_all(name, "_");
    let collapsed = REPEATED_UNDERSCORES.replace_all(&replaced, "_");
    let collapsed = REPEATED_WHITESPACE.replace_all(&collapsed, " ");
    let trimmed = collapsed.trim_matches(|c: char| c == '.' || c.is_whitespace());

    if trimmed.is_empty() {
        return "file".to_string();
    }

    truncate_preserving_extension(trimmed, MAX_FILENAME_BYTES)
}

fn truncate_preserving_extension(name: &str, max_bytes: usize) -> String {
    if name.len() <= max_bytes {
        return name.to_string();
    }

    let (stem, extension) = split_extension(name);
    let suffix = extension.map(|e| format!(".{e}")).unwrap_or_default();
    if suffix.len() >= max_bytes {
        return truncate_at_char_boundary(name, max_bytes).to_string();
    }

    let stem = truncate_at_char_boundary(stem, max_bytes - suffix.len());
    format!("{stem}{suffix}")
}

fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// The `n`-th numbered variant of a filename: `photo.png` → `photo (2).png`.
///
/// `n == 0` returns the name unchanged. The stem is shortened when needed so
/// the variant stays within [`MAX_FILENAME_BYTES`].
pub fn numbered_variant(name: &str, n: usize) -> String {
    if n == 0 {
        return name.to_string();
    }
    let (stem, extension) = split_extension(name);
    let suffix = match extension {
        Some(ext) => format!(" ({n}).{ext}"),
        None => format!(" ({n})"),
    };
    let stem = truncate_at_char_boundary(stem, MAX_FILENAME_BYTES.saturating_sub(suffix.len()));
    format!("{stem}{suffix}")
}
