//! Filesystem-safe cleaning of remote file names.

use std::path::{Component, Path};

/// Characters removed from names: path separators plus the set Windows
/// refuses in file names.
const UNSAFE_CHARS: &[char] = &['/', '\\', '<', '>', ':', '"', '|', '?', '*'];

/// Percent-decodes a URL path segment, replacing invalid UTF-8.
pub(crate) fn percent_decode_lossy(segment: &str) -> String {
    let bytes = urlencoding::decode_binary(segment.as_bytes());
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Removes separators, reserved characters and control characters, then
/// trims surrounding whitespace.
///
/// Characters are dropped rather than replaced so that names like
/// `Game: Part 2.zip` keep their readable form (`Game Part 2.zip`).
pub(crate) fn clean_file_name(decoded: &str) -> String {
    decoded
        .chars()
        .filter(|c| !UNSAFE_CHARS.contains(c) && !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Returns true when `name` is a single normal path component.
pub(crate) fn is_single_normal_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_decode_lossy_decodes_spaces_and_brackets() {
        assert_eq!(
            percent_decode_lossy("My%20Game%20%5BUSA%5D.zip"),
            "My Game [USA].zip"
        );
    }

    #[test]
    fn test_percent_decode_lossy_replaces_invalid_utf8() {
        assert_eq!(percent_decode_lossy("bad%FFname.zip"), "bad\u{FFFD}name.zip");
    }

    #[test]
    fn test_percent_decode_lossy_leaves_stray_percent() {
        assert_eq!(percent_decode_lossy("100%.zip"), "100%.zip");
    }

    #[test]
    fn test_clean_file_name_removes_invalid_chars() {
        assert_eq!(clean_file_name("file/name.zip"), "filename.zip");
        assert_eq!(clean_file_name("file\\name.zip"), "filename.zip");
        assert_eq!(clean_file_name("Game: Part 2.zip"), "Game Part 2.zip");
        assert_eq!(clean_file_name("what?*.zip"), "what.zip");
        assert_eq!(clean_file_name("\"quoted\" <x>|.zip"), "quoted x.zip");
    }

    #[test]
    fn test_clean_file_name_removes_control_chars_and_trims() {
        assert_eq!(clean_file_name("  tab\tname\u{0}.zip  "), "tabname.zip");
    }

    #[test]
    fn test_clean_file_name_preserves_valid_chars() {
        assert_eq!(
            clean_file_name("My Game (v1.0) [USA].zip"),
            "My Game (v1.0) [USA].zip"
        );
        assert_eq!(clean_file_name("日本語.zip"), "日本語.zip");
    }

    #[test]
    fn test_is_single_normal_component() {
        assert!(is_single_normal_component("game.zip"));
        assert!(!is_single_normal_component("."));
        assert!(!is_single_normal_component(".."));
        assert!(!is_single_normal_component(""));
    }
}
