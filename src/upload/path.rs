//! Repository path generation
//!
//! Every stored file lands in its own directory
//! `uploads/<YYYY-MM-DD-HH-MM-SS>-<8 hex>/<name>`. The random suffix keeps two
//! uploads in the same second apart; the name is reduced to `[A-Za-z0-9._-]`.

use chrono::{DateTime, Utc};
use rand::Rng;

/// Root directory of all generated paths
pub const UPLOAD_ROOT: &str = "uploads";

/// Number of random bytes in the directory suffix
pub const SUFFIX_BYTES: usize = 4;

/// Build a fresh path for `original_name` from the current time and a random suffix
pub fn build_path(original_name: Option<&str>) -> String {
    build_path_at(Utc::now(), &random_suffix(), original_name)
}

/// Build a path from explicit inputs
pub fn build_path_at(now: DateTime<Utc>, suffix: &str, original_name: Option<&str>) -> String {
    let name = match original_name.filter(|n| !n.is_empty()) {
        Some(name) => sanitize_file_name(name),
        None => format!("upload_{}", suffix),
    };

    format!("{}/{}-{}/{}", UPLOAD_ROOT, timestamp_segment(now), suffix, name)
}

/// Second-precision UTC timestamp with no `:` or `T`
pub fn timestamp_segment(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d-%H-%M-%S").to_string()
}

/// Hex rendering of [`SUFFIX_BYTES`] bytes from the thread-local CSPRNG
pub fn random_suffix() -> String {
    let bytes: [u8; SUFFIX_BYTES] = rand::rng().random();
    hex::encode(bytes)
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
///
/// Replacement is per Unicode scalar value, so `"😀.png"` becomes `"_.png"`.
/// A name made only of dots is turned into underscores: a `.` or `..`
/// segment would be collapsed by URL normalization and the write would land
/// on the enclosing directory.
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.chars().all(|c| c == '.') {
        return "_".repeat(sanitized.len());
    }

    sanitized
}
