//! Turns raw service replies into `Metadata`.

use std::collections::HashSet;

use time::{
    format_description::well_known::{Rfc2822, Rfc3339},
    macros::format_description,
    OffsetDateTime, PrimitiveDateTime,
};

use crate::{
    model::{
        fs::{DirEntry, FileEntry, Metadata},
        object::RawMetadata,
    },
    util::path::{self, PathPrefixer, DELIMITER},
};

/// Resolves the logical path of `raw` and builds its metadata.
///
/// The path is `explicit_path` when given, otherwise the key (or, for bare
/// common prefixes, the prefix) with the adapter prefix removed. Returns
/// `None` when no path resolves or the key is the prefix itself.
pub fn normalize_response(
    prefixer: &PathPrefixer,
    raw: &RawMetadata,
    explicit_path: Option<&str>,
) -> Option<Metadata> {
    let resolved = match explicit_path {
        Some(p) if !p.is_empty() => Some(p.to_string()),
        _ => match (&raw.key, &raw.prefix) {
            (Some(key), _) => prefixer.remove_prefix(key),
            (None, Some(prefix)) => prefixer.remove_prefix(prefix),
            (None, None) => None,
        },
    }
    .filter(|p| !p.is_empty())?;

    let dirname = path::dirname(&resolved);
    let timestamp = raw.last_modified.as_deref().and_then(parse_timestamp);

    if path::is_directory_key(&resolved) {
        return Some(Metadata::Dir(DirEntry {
            path: resolved.trim_end_matches(DELIMITER).to_string(),
            dirname,
            timestamp,
        }));
    }

    Some(Metadata::File(FileEntry {
        path: resolved,
        dirname,
        timestamp,
        size: raw.size,
        mimetype: raw.content_type.clone(),
        storage_class: raw.storage_class.clone(),
    }))
}

/// Seconds since the epoch for an RFC 3339, RFC 2822 or HTTP-date string.
pub fn parse_timestamp(value: &str) -> Option<i64> {
    let value = value.trim();

    if let Ok(dt) = OffsetDateTime::parse(value, &Rfc3339) {
        return Some(dt.unix_timestamp());
    }

    if let Ok(dt) = OffsetDateTime::parse(value, &Rfc2822) {
        return Some(dt.unix_timestamp());
    }

    let http_date = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );

    PrimitiveDateTime::parse(value, &http_date)
        .ok()
        .map(|dt| dt.assume_utc().unix_timestamp())
}

/// Appends a `Dir` entry for every ancestor directory implied by the listing
/// but not present in it.
pub fn emulate_directories(mut listing: Vec<Metadata>) -> Vec<Metadata> {
    let mut implied: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    let mut listed = HashSet::new();

    for entry in &listing {
        if entry.is_dir() {
            listed.insert(entry.path().to_string());
        }

        let mut parent = entry.dirname().to_string();
        while !parent.trim().is_empty() && !seen.contains(&parent) {
            seen.insert(parent.clone());
            implied.push(parent.clone());
            parent = path::dirname(&parent);
        }
    }

    for directory in implied {
        if listed.contains(&directory) {
            continue;
        }

        listing.push(Metadata::Dir(DirEntry {
            dirname: path::dirname(&directory),
            path: directory,
            timestamp: None,
        }));
    }

    listing
}
