//! Tag codec.
//!
//! A tag is either bare (`deprecated`) or `key:value`. The value, and a bare
//! tag itself, may carry a `/`-delimited hierarchy (`topic:ml/research`,
//! `work/active`). Two matching flavours exist and are deliberately distinct:
//!
//! - [`filter_tags`] matches whole strings, with `*` as a wildcard.
//! - [`match_hierarchical`] matches level by level and treats the pattern as
//!   a prefix query.

use std::collections::BTreeMap;

use regex::Regex;

use repoindex_config::log_vfs_warn;

/// Key → optional value. Keys are unique; see [`parse_tags`].
pub type TagMap = BTreeMap<String, Option<String>>;

/// Prefixes reserved for derived tags.
pub const IMPLICIT_PREFIXES: &[&str] = &["repo:", "dir:", "license:", "has:", "status:", "type:"];

/// Bare tags reserved for derived tags (hosting and registry markers).
pub const IMPLICIT_EXACT: &[&str] = &["github", "gitlab", "bitbucket", "pypi", "crates", "npm"];

/// Split a tag on its first `:`.
pub fn parse_tag(tag: &str) -> (&str, Option<&str>) {
    match tag.split_once(':') {
        Some((key, value)) => (key, Some(value)),
        None => (tag, None),
    }
}

/// Inverse of [`parse_tag`].
pub fn format_tag(key: &str, value: Option<&str>) -> String {
    match value {
        Some(value) => format!("{}:{}", key, value),
        None => key.to_string(),
    }
}

/// Parse a list of tags into a map. Later duplicates of a key win.
pub fn parse_tags<I, S>(tags: I) -> TagMap
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|tag| {
            let (key, value) = parse_tag(tag.as_ref());
            (key.to_string(), value.map(str::to_string))
        })
        .collect()
}

/// Render a map back into tag strings, ordered by key.
pub fn format_tags(tags: &TagMap) -> Vec<String> {
    tags.iter()
        .map(|(key, value)| format_tag(key, value.as_deref()))
        .collect()
}

/// Key-wise merge: every key in `new` takes `new`'s value, keys only in
/// `existing` are kept.
pub fn merge_tags(existing: &TagMap, new: &TagMap) -> TagMap {
    let mut merged = existing.clone();
    merged.extend(new.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Select the tags matching `pattern`.
///
/// A pattern containing `*` is an anchored whole-string match where `*`
/// stands for any run of characters; any other pattern must match exactly.
pub fn filter_tags<S: AsRef<str>>(tags: &[S], pattern: &str) -> Vec<String> {
    let matcher = if pattern.contains('*') {
        match wildcard_regex(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                log_vfs_warn!("Unusable tag pattern", pattern, error = %e);
                return Vec::new();
            }
        }
    } else {
        None
    };

    tags.iter()
        .map(|tag| tag.as_ref())
        .filter(|tag| match &matcher {
            Some(re) => re.is_match(tag),
            None => *tag == pattern,
        })
        .map(str::to_string)
        .collect()
}

fn wildcard_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{}$", body))
}

/// The ordered levels a tag occupies in the `by-tag` hierarchy.
///
/// - `key:a/b` → `[key, a, b]`
/// - `key:value` → `[key, value]`
/// - `key:` → `[key]`
/// - `a/b` → `[a, b]`
/// - `bare` → `[bare]`
///
/// Empty segments produced by doubled or trailing slashes are dropped.
pub fn parse_hierarchical_levels(tag: &str) -> Vec<String> {
    if let Some((key, value)) = tag.split_once(':') {
        if value.is_empty() {
            vec![key.to_string()]
        } else if value.contains('/') {
            std::iter::once(key)
                .chain(value.split('/').filter(|s| !s.is_empty()))
                .map(str::to_string)
                .collect()
        } else {
            vec![key.to_string(), value.to_string()]
        }
    } else if tag.contains('/') {
        tag.split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        vec![tag.to_string()]
    }
}

/// Level-wise prefix match of `tag` against `pattern`.
///
/// The first level is the key and must be equal. A `*` level matches the
/// remainder of the tag. A pattern that runs out of levels while matching
/// succeeds; a pattern longer than the tag never does.
pub fn match_hierarchical(tag: &str, pattern: &str) -> bool {
    let tag_levels = parse_hierarchical_levels(tag);
    let pattern_levels = parse_hierarchical_levels(pattern);

    for (i, level) in pattern_levels.iter().enumerate() {
        if level == "*" {
            return true;
        }
        match tag_levels.get(i) {
            Some(tag_level) if tag_level == level => {}
            _ => return false,
        }
    }
    true
}

/// Whether `tag` lives in a namespace reserved for derived tags.
pub fn is_protected_tag(tag: &str) -> bool {
    IMPLICIT_PREFIXES.iter().any(|p| tag.starts_with(p)) || IMPLICIT_EXACT.contains(&tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format_roundtrip() {
        for tag in ["deprecated", "topic:ml", "topic:ml/research", "key:", "work/active"] {
            let (key, value) = parse_tag(tag);
            assert_eq!(format_tag(key, value), tag);
        }
    }

    #[test]
    fn test_parse_tag_splits_on_first_colon() {
        assert_eq!(parse_tag("url:http://x"), ("url", Some("http://x")));
        assert_eq!(parse_tag("bare"), ("bare", None));
    }

    #[test]
    fn test_parse_tags_last_wins() {
        let map = parse_tags(["topic:a", "topic:b", "flag"]);
        assert_eq!(map.get("topic"), Some(&Some("b".to_string())));
        assert_eq!(map.get("flag"), Some(&None));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_merge_tags_new_wins_per_key() {
        let existing = parse_tags(["topic:a", "owner:me", "flag"]);
        let new = parse_tags(["topic:b", "stage:beta"]);
        let merged = merge_tags(&existing, &new);

        assert_eq!(merged.get("topic"), Some(&Some("b".to_string())));
        assert_eq!(merged.get("owner"), Some(&Some("me".to_string())));
        assert_eq!(merged.get("stage"), Some(&Some("beta".to_string())));
        assert_eq!(merged.get("flag"), Some(&None));
        assert_eq!(
            format_tags(&merged),
            vec!["flag", "owner:me", "stage:beta", "topic:b"]
        );
    }

    #[test]
    fn test_filter_tags_wildcard_selects_key() {
        let tags = ["topic:ml", "topic:web/api", "lang:rust", "topical", "xtopic:a"];
        assert_eq!(filter_tags(&tags, "topic:*"), vec!["topic:ml", "topic:web/api"]);
    }

    #[test]
    fn test_filter_tags_exact_and_escaping() {
        let tags = ["a.b", "axb", "v:1+2"];
        assert_eq!(filter_tags(&tags, "a.b"), vec!["a.b"]);
        assert_eq!(filter_tags(&tags, "a.*"), vec!["a.b"]);
        assert_eq!(filter_tags(&tags, "v:1+*"), vec!["v:1+2"]);
        assert!(filter_tags(&tags, "missing").is_empty());
    }

    #[test]
    fn test_hierarchical_levels() {
        assert_eq!(parse_hierarchical_levels("topic:ml/research"), ["topic", "ml", "research"]);
        assert_eq!(parse_hierarchical_levels("topic:ml"), ["topic", "ml"]);
        assert_eq!(parse_hierarchical_levels("topic:"), ["topic"]);
        assert_eq!(parse_hierarchical_levels("work//active/"), ["work", "active"]);
        assert_eq!(parse_hierarchical_levels("deprecated"), ["deprecated"]);
    }

    #[test]
    fn test_match_hierarchical_is_prefix_query() {
        assert!(match_hierarchical("topic:a/b/c", "topic:a/b"));
        assert!(!match_hierarchical("topic:a/b", "topic:a/b/c"));
        assert!(match_hierarchical("topic:a/b/c", "topic:a/*"));
        assert!(match_hierarchical("topic:a/b/c", "topic:a/b/c"));
        assert!(!match_hierarchical("topic:a/b/c", "lang:a"));
        assert!(!match_hierarchical("topic:ab", "topic:a"));
    }

    #[test]
    fn test_hierarchical_and_filter_semantics_differ() {
        // Prefix query matches, whole-string match does not
        assert!(match_hierarchical("topic:a/b", "topic:a"));
        assert!(filter_tags(&["topic:a/b"], "topic:a").is_empty());
    }

    #[test]
    fn test_protected_tags() {
        assert!(is_protected_tag("repo:p1"));
        assert!(is_protected_tag("status:dirty"));
        assert!(is_protected_tag("github"));
        assert!(!is_protected_tag("topic:ml"));
        assert!(!is_protected_tag("githubby"));
    }
}
