//! Server-side path grammar and the translation between it and a profile's
//! local folder-UUID ↔ semantic-name mapping.
//!
//! ```text
//! path    ::= "/" | "/" segment ("/" segment)*
//! segment ::= reserved | UUID | filename
//! reserved::= "wsp" | "out" | "tmp" | "new"
//! filename::= unix-seconds "." size-bytes "." UUID
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::address::UUID;
use crate::error::Result;

static FILENAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]+\.[0-9]+\.[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap()
});

const RESERVED_SEGMENTS: &[&str] = &["wsp", "out", "tmp", "new"];

/// True as long as `path` has no doubled or backslashed separators. This is
/// deliberately permissive — full segment grammar checking happens in
/// [`is_valid_filename`] / [`is_reserved_segment`] for callers that need it.
pub fn validate_dbpath(path: &str) -> bool {
    !path.is_empty() && !path.contains("//") && !path.contains('\\')
}

pub fn is_reserved_segment(segment: &str) -> bool {
    RESERVED_SEGMENTS.contains(&segment)
}

/// Generates a server-style file name embedding a unix-seconds timestamp,
/// size in bytes, and a fresh UUID.
pub fn generate_filename(unix_seconds: u64, size_bytes: u64) -> String {
    format!("{unix_seconds}.{size_bytes}.{}", UUID::generate().as_string())
}

pub fn is_valid_filename(name: &str) -> bool {
    FILENAME_PATTERN.is_match(name)
}

/// A validated internal path: no doubled/backslashed separators, no
/// trailing slash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DBPath {
    path: String,
}

impl DBPath {
    pub fn new(src: &str) -> Self {
        let mut trimmed = src.trim().to_string();
        if !validate_dbpath(&trimmed) {
            return Self { path: String::new() };
        }
        if trimmed.len() > 1 && trimmed.ends_with('/') {
            trimmed.pop();
        }
        Self { path: trimmed }
    }

    pub fn is_valid(&self) -> bool {
        !self.path.is_empty() && validate_dbpath(&self.path)
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn push(&mut self, segment: &str) {
        let trimmed = segment.trim().trim_matches('/');
        if trimmed.is_empty() {
            return;
        }
        if self.path.is_empty() || self.path == "/" {
            self.path = format!("/{trimmed}");
        } else {
            self.path = format!("{}/{trimmed}", self.path);
        }
    }
}

/// Translates a server-returned path (`/ wsp <wid> <folder-uuid> <filename>`)
/// into a local-filesystem path using the folder's semantic name instead of
/// its UUID.
pub fn to_local_path(wid: &UUID, folder_maps: &HashMap<String, String>, server_path: &str) -> Result<String> {
    let stripped = server_path
        .strip_prefix(&format!("/ wsp {} ", wid.as_string()))
        .or_else(|| server_path.strip_prefix(&format!("/wsp/{}/", wid.as_string())))
        .unwrap_or_else(|| server_path.trim_start_matches('/'));

    let parts: Vec<String> = stripped
        .split(|c: char| c == ' ' || c == '/')
        .filter(|s| !s.is_empty())
        .map(|part| folder_maps.get(part).cloned().unwrap_or_else(|| part.to_string()))
        .collect();

    Ok(format!("/{}", parts.join("/")))
}

/// The inverse of [`to_local_path`]: builds a server path out of a local
/// path using the folder's UUID instead of its semantic name.
pub fn to_server_path(wid: &UUID, name_to_fid: &HashMap<String, String>, local_path: &str) -> String {
    let trimmed = local_path.trim().trim_start_matches('/');
    let mut segments = vec!["wsp".to_string(), wid.as_string().to_string()];
    for part in trimmed.split('/').filter(|s| !s.is_empty()) {
        segments.push(name_to_fid.get(part).cloned().unwrap_or_else(|| part.to_string()));
    }
    format!("/ {}", segments.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dbpath_strips_trailing_slash() {
        let p = DBPath::new("/messages/");
        assert_eq!(p.as_str(), "/messages");
    }

    #[test]
    fn dbpath_rejects_doubled_separators() {
        let p = DBPath::new("/messages//attachments");
        assert!(!p.is_valid());
    }

    #[test]
    fn filename_pattern_matches_generated_names() {
        let name = generate_filename(1700000000, 4096);
        assert!(is_valid_filename(&name));
        assert!(!is_valid_filename("not-a-filename"));
    }

    #[test]
    fn reserved_segments_recognized() {
        assert!(is_reserved_segment("wsp"));
        assert!(!is_reserved_segment("messages"));
    }

    #[test]
    fn to_local_path_substitutes_folder_names() {
        let wid = UUID::generate();
        let fid = UUID::generate();
        let mut maps = HashMap::new();
        maps.insert(fid.as_string().to_string(), "messages".to_string());

        let server_path = format!("/ wsp {} {} 123.456.{}", wid.as_string(), fid.as_string(), UUID::generate());
        let local = to_local_path(&wid, &maps, &server_path).unwrap();
        assert!(local.starts_with("/messages/"));
    }

    #[test]
    fn to_server_path_is_the_inverse_direction() {
        let wid = UUID::generate();
        let fid = UUID::generate();
        let mut name_to_fid = HashMap::new();
        name_to_fid.insert("messages".to_string(), fid.as_string().to_string());

        let server_path = to_server_path(&wid, &name_to_fid, "/messages/somefile");
        assert!(server_path.contains(fid.as_string()));
        assert!(server_path.starts_with(&format!("/ wsp {}", wid.as_string())));
    }
}
