//! Tag Resolver
//!
//! Pure parsing of the two settings map fields. Matching is
//! case-insensitive after trimming, the first matching entry in
//! declaration order wins, and malformed entries contribute nothing.

use crate::constants::markup::DEFAULT_TAG_STYLE;

/// Resolve the tag list for an identity from the `identity:tag1,tag2;...` map.
///
/// Returns an empty vec when no entry matches. A matching entry without a
/// `:` also yields no tags, even if a later duplicate entry is well-formed.
pub fn tags_for_player(map: &str, identity: &str) -> Vec<String> {
    let wanted = identity.trim().to_lowercase();
    let entry = map.split(';').find(|entry| {
        entry.split(':').next().unwrap_or("").trim().to_lowercase() == wanted
    });
    match entry.and_then(|entry| entry.split_once(':')) {
        Some((_, tags)) => tags.split(',').map(str::to_string).collect(),
        None => Vec::new(),
    }
}

/// Resolve the style expression for a tag from the `+tag=style` map.
///
/// Falls back to the built-in default when no entry matches or the
/// matching entry has an empty value.
pub fn style_for_tag(map: &str, tag: &str) -> String {
    let wanted = tag.trim().to_lowercase();
    map.split('+')
        .filter(|entry| !entry.trim().is_empty())
        .find(|entry| entry.split('=').next().unwrap_or("").trim().to_lowercase() == wanted)
        .and_then(|entry| entry.split_once('='))
        .map(|(_, style)| style)
        .filter(|style| !style.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_TAG_STYLE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_case_insensitive_and_trimmed() {
        assert_eq!(tags_for_player("alice:VIP", "Alice"), ["VIP"]);
        assert_eq!(tags_for_player("alice:VIP", "aLICE "), ["VIP"]);
        assert_eq!(tags_for_player("  Alice :VIP", "alice"), ["VIP"]);
    }

    #[test]
    fn test_tags_no_match_is_empty() {
        assert!(tags_for_player("alice:VIP", "Bob").is_empty());
        assert!(tags_for_player("", "Bob").is_empty());
    }

    #[test]
    fn test_tags_first_match_wins() {
        assert_eq!(tags_for_player("bob:A;bob:B", "bob"), ["A"]);
    }

    #[test]
    fn test_tags_malformed_match_shadows_later_duplicate() {
        // The first "bob" entry has no ':' and contributes nothing; the
        // well-formed duplicate after it is never consulted.
        assert!(tags_for_player("bob;bob:VIP", "bob").is_empty());
    }

    #[test]
    fn test_tags_order_and_duplicates_preserved() {
        assert_eq!(
            tags_for_player("bob:CLAN,VIP,CLAN", "bob"),
            ["CLAN", "VIP", "CLAN"]
        );
    }

    #[test]
    fn test_tags_untrimmed_segments_returned_as_is() {
        // Chip construction trims; the resolver itself does not.
        assert_eq!(tags_for_player("bob: CLAN , VIP", "bob"), [" CLAN ", " VIP"]);
    }

    #[test]
    fn test_style_lookup_case_insensitive() {
        let map = "+CLAN=color:red; +vip=color:blue;";
        assert_eq!(style_for_tag(map, "clan"), "color:red; ");
        assert_eq!(style_for_tag(map, " VIP "), "color:blue;");
    }

    #[test]
    fn test_style_unknown_tag_falls_back_to_default() {
        assert_eq!(style_for_tag("+CLAN=color:red;", "unknown-tag"), DEFAULT_TAG_STYLE);
        assert_eq!(style_for_tag("", "CLAN"), DEFAULT_TAG_STYLE);
    }

    #[test]
    fn test_style_empty_value_falls_back_to_default() {
        assert_eq!(style_for_tag("+CLAN=", "CLAN"), DEFAULT_TAG_STYLE);
    }

    #[test]
    fn test_style_first_match_wins() {
        assert_eq!(style_for_tag("+CLAN=a +CLAN=b", "CLAN"), "a ");
    }

    #[test]
    fn test_style_blank_segments_skipped() {
        assert_eq!(style_for_tag("+ +CLAN=color:red;", "CLAN"), "color:red;");
    }
}
