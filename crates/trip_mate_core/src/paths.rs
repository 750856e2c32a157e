//! crates/trip_mate_core/src/paths.rs
//!
//! Object-store path conventions: `trips/{tripId}/items/{stamp}_{name}` for
//! originals and `trips/{tripId}/items/{stamp}_thumb_{name}` for thumbnails.

use chrono::Utc;
use percent_encoding::percent_decode_str;
use std::sync::atomic::{AtomicI64, Ordering};

/// Replaces everything outside `[A-Za-z0-9.-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "file".to_string()
    } else {
        sanitized
    }
}

/// Hands out millisecond stamps that never repeat within a process, so two
/// uploads of the same file name in the same millisecond get distinct paths.
#[derive(Debug, Default)]
pub struct PathStamper {
    last: AtomicI64,
}

impl PathStamper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut previous = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(previous + 1);
            match self.last.compare_exchange_weak(
                previous,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => previous = actual,
            }
        }
    }
}

/// The pair of paths one upload may occupy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPaths {
    pub original: String,
    pub thumbnail: String,
}

pub fn asset_paths(trip_id: &str, stamp: i64, file_name: &str) -> AssetPaths {
    let name = sanitize_file_name(file_name);
    AssetPaths {
        original: format!("trips/{}/items/{}_{}", trip_id, stamp, name),
        thumbnail: format!("trips/{}/items/{}_thumb_{}", trip_id, stamp, name),
    }
}

/// Extracts the object path from a Firebase-style download URL
/// (`.../o/{percent-encoded path}?alt=media`).
pub fn firebase_object_path(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("/o/")?;
    let encoded = rest.split(['?', '#']).next().unwrap_or_default();
    if encoded.is_empty() {
        return None;
    }
    Some(percent_decode_str(encoded).decode_utf8_lossy().into_owned())
}

/// Extracts the object path from a URL that starts with `base`.
pub fn path_under_base(url: &str, base: &str) -> Option<String> {
    let base = base.trim_end_matches('/');
    let rest = url.strip_prefix(base)?.strip_prefix('/')?;
    let path = rest.split(['?', '#']).next().unwrap_or_default();
    if path.is_empty() {
        return None;
    }
    Some(percent_decode_str(path).decode_utf8_lossy().into_owned())
}
