//! Path segment sanitisation for materialized trees.

/// Used when a segment sanitises to nothing
pub const PLACEHOLDER: &str = "_unnamed";

const FORBIDDEN: &[char] = &['/', '\\', ':', '<', '>', '"', '|', '?', '*'];

/// Make `segment` safe to use as a single path component.
///
/// Separators and characters that some filesystems reject become `_`,
/// leading and trailing dots are stripped so no segment can be `.`/`..`
/// or hidden.
pub fn sanitize_segment(segment: &str) -> String {
    let replaced: String = segment
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) || c.is_control() { '_' } else { c })
        .collect();
    let trimmed = replaced.trim().trim_matches('.');
    if trimmed.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replaces_forbidden_characters() {
        assert_eq!(sanitize_segment("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_segment("<x>|\"y\"?*"), "_x___y___");
    }

    #[test]
    fn test_strips_dots() {
        assert_eq!(sanitize_segment(".hidden"), "hidden");
        assert_eq!(sanitize_segment("v1.0."), "v1.0");
    }

    #[test]
    fn test_empty_falls_back_to_placeholder() {
        assert_eq!(sanitize_segment(""), PLACEHOLDER);
        assert_eq!(sanitize_segment(".."), PLACEHOLDER);
        assert_eq!(sanitize_segment("  "), PLACEHOLDER);
    }
}
