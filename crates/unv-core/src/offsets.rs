//! Section markers and the offset resolver.
//!
//! A universe file is a bag of sections, each introduced by a fixed ASCII
//! label preceded by a zero byte (e.g. `\0Tables;`). Section order on disk
//! is not fixed, so the whole file is scanned once up front and every known
//! marker is resolved to the offset just past its label. Readers then seek
//! to those offsets in whatever order the data dependencies allow.

use std::collections::BTreeMap;

use crate::error::{DecodeError, Result};

/// Markers whose section layout is decoded structurally.
pub mod marker {
    pub const PARAMETERS: &str = "Parameters;";
    pub const CUSTOM_PARAMETERS: &str = "Parameters_6_0;";
    pub const TABLES: &str = "Tables;";
    pub const VIRTUAL_TABLES: &str = "Virtual Tables;";
    pub const COLUMNS_ID: &str = "Columns Id;";
    pub const JOINS: &str = "Joins;";
    pub const CONTEXTS: &str = "Contexts;";
    pub const LINKS: &str = "Links;";
    pub const HIERARCHIES: &str = "Hierarchies;";
    pub const OBJECTS: &str = "Objects;";
}

/// Markers whose internal layout is unknown. Their byte spans are captured
/// verbatim as opaque sections and never interpreted.
pub const OPAQUE_MARKERS: [&str; 37] = [
    "Columns;",
    "Parameters_4_1;",
    "Parameters_5_0;",
    "Parameters_11_5;",
    "Object_Formats;",
    "Object_ExtraFormats;",
    "Dynamic_Class_Descriptions;",
    "Dynamic_Object_Descriptions;",
    "Dynamic_Property_Descriptions;",
    "Audit;",
    "Dimensions;",
    "OLAPInfo;",
    "Graphical_Info;",
    "Crystal_References;",
    "XML-LOV;",
    "Integrity;",
    "AggregateNavigation;",
    "BoundedColumns;",
    "BuildOrigin_v6;",
    "CompulsaryType;",
    "Deleted References;",
    "DELETED_HISTORY;",
    "Dot_Tables;",
    "Downward;",
    "FormatLocaleSort;",
    "FormatVersion;",
    "Joins Extensions;",
    "Key References;",
    "KernelPageFormat;",
    "Platform;",
    "UNICODE ON;",
    "Upward;",
    "Upward_LocalIndexing;",
    "Upward_Mapping;",
    "Upward_Override;",
    "Upward_Override_New;",
    "WindowsPageFormat;",
];

/// Every marker the format is known to carry.
pub const ALL_MARKERS: [&str; 47] = [
    marker::PARAMETERS,
    marker::CUSTOM_PARAMETERS,
    marker::TABLES,
    marker::VIRTUAL_TABLES,
    marker::COLUMNS_ID,
    marker::JOINS,
    marker::CONTEXTS,
    marker::LINKS,
    marker::HIERARCHIES,
    marker::OBJECTS,
    "Columns;",
    "Parameters_4_1;",
    "Parameters_5_0;",
    "Parameters_11_5;",
    "Object_Formats;",
    "Object_ExtraFormats;",
    "Dynamic_Class_Descriptions;",
    "Dynamic_Object_Descriptions;",
    "Dynamic_Property_Descriptions;",
    "Audit;",
    "Dimensions;",
    "OLAPInfo;",
    "Graphical_Info;",
    "Crystal_References;",
    "XML-LOV;",
    "Integrity;",
    "AggregateNavigation;",
    "BoundedColumns;",
    "BuildOrigin_v6;",
    "CompulsaryType;",
    "Deleted References;",
    "DELETED_HISTORY;",
    "Dot_Tables;",
    "Downward;",
    "FormatLocaleSort;",
    "FormatVersion;",
    "Joins Extensions;",
    "Key References;",
    "KernelPageFormat;",
    "Platform;",
    "UNICODE ON;",
    "Upward;",
    "Upward_LocalIndexing;",
    "Upward_Mapping;",
    "Upward_Override;",
    "Upward_Override_New;",
    "WindowsPageFormat;",
];

/// Immutable map from marker name to the offset of its section content
/// (the byte just past the zero-prefixed label). Built once per file;
/// markers absent from the file simply have no entry.
#[derive(Debug, Clone, Default)]
pub struct SectionOffsets {
    map: BTreeMap<&'static str, usize>,
}

impl SectionOffsets {
    pub fn resolve(data: &[u8]) -> Self {
        let mut map = BTreeMap::new();
        for m in ALL_MARKERS {
            if let Some(end) = locate_marker(data, m) {
                map.insert(m, end);
            }
        }
        Self { map }
    }

    pub fn get(&self, marker: &str) -> Option<usize> {
        self.map.get(marker).copied()
    }

    pub fn require(&self, marker: &'static str) -> Result<usize> {
        self.get(marker)
            .ok_or(DecodeError::MarkerNotFound { marker })
    }

    /// Smallest resolved offset strictly past `pos`. Used to bound opaque
    /// sections, whose length is not stored anywhere in the file.
    pub fn next_after(&self, pos: usize) -> Option<usize> {
        self.map.values().copied().filter(|&o| o > pos).min()
    }
}

/// Find the content offset for one marker.
///
/// The marker text can also occur as a substring of unrelated data close
/// to a real or spurious match. When the plain text (without the zero
/// prefix) recurs within 20 bytes before the candidate or 20 bytes after
/// it, the candidate is treated as a false echo and the search restarts
/// 20 bytes past its end.
fn locate_marker(data: &[u8], marker: &str) -> Option<usize> {
    let text = marker.as_bytes();
    let mut pattern = Vec::with_capacity(text.len() + 1);
    pattern.push(0u8);
    pattern.extend_from_slice(text);

    let begin = find(data, &pattern, 0)?;
    let end = begin + pattern.len();
    let before = &data[begin.saturating_sub(20)..begin];
    let after = &data[end..data.len().min(end + 20)];
    if contains(before, text) || contains(after, text) {
        let begin = find(data, &pattern, end + 20)?;
        return Some(begin + pattern.len());
    }
    Some(end)
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_marker(prefix: &[u8], marker: &str, suffix: &[u8]) -> Vec<u8> {
        let mut d = prefix.to_vec();
        d.push(0);
        d.extend_from_slice(marker.as_bytes());
        d.extend_from_slice(suffix);
        d
    }

    #[test]
    fn resolves_offset_past_label() {
        let data = with_marker(b"junkjunk", "Audit;", b"payload");
        let offs = SectionOffsets::resolve(&data);
        assert_eq!(offs.get("Audit;"), Some(8 + 1 + "Audit;".len()));
    }

    #[test]
    fn absent_marker_has_no_entry() {
        let offs = SectionOffsets::resolve(b"nothing of note here");
        assert_eq!(offs.get("Audit;"), None);
        assert!(offs.require("Joins;").is_err());
    }

    #[test]
    fn echo_after_match_forces_rescan() {
        // First zero-prefixed match is followed by the plain text within
        // 20 bytes; the resolver must take the later occurrence instead.
        let mut data = Vec::new();
        data.extend_from_slice(b"head");
        data.push(0);
        data.extend_from_slice(b"Audit;");
        data.extend_from_slice(b"xxAudit;xx"); // echo inside the window
        data.extend_from_slice(&[b'.'; 24]); // push the real one past end+20
        let real_begin = data.len();
        data.push(0);
        data.extend_from_slice(b"Audit;");
        data.extend_from_slice(b"real payload");

        let offs = SectionOffsets::resolve(&data);
        assert_eq!(offs.get("Audit;"), Some(real_begin + 1 + "Audit;".len()));
    }

    #[test]
    fn echo_before_match_forces_rescan() {
        let mut data = Vec::new();
        data.extend_from_slice(b"Audit;--"); // plain echo right before
        data.push(0);
        data.extend_from_slice(b"Audit;");
        data.extend_from_slice(&[b'-'; 30]);
        let real_begin = data.len();
        data.push(0);
        data.extend_from_slice(b"Audit;");

        let offs = SectionOffsets::resolve(&data);
        assert_eq!(offs.get("Audit;"), Some(real_begin + 1 + "Audit;".len()));
    }

    #[test]
    fn rejected_match_with_no_replacement_yields_nothing() {
        let mut data = Vec::new();
        data.extend_from_slice(b"Audit;--");
        data.push(0);
        data.extend_from_slice(b"Audit;");
        let offs = SectionOffsets::resolve(&data);
        assert_eq!(offs.get("Audit;"), None);
    }

    #[test]
    fn next_after_picks_nearest_following_offset() {
        let mut data = with_marker(b"", "Audit;", b"0123456789");
        let platform = data.len();
        data.push(0);
        data.extend_from_slice(b"Platform;");
        let offs = SectionOffsets::resolve(&data);
        let audit = offs.get("Audit;").unwrap();
        assert_eq!(offs.next_after(audit), Some(platform + 1 + "Platform;".len()));
        assert_eq!(offs.next_after(data.len()), None);
    }
}
