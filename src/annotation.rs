//! Annotation Builder
//!
//! Turns a resolved identity into the fragment description the host
//! materializes. Construction has no side effects; inserting the fragment
//! into the tree is the caller's job.

use crate::settings::TaggerSettings;
use crate::tags;

/// One decorative chip inside an annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagChip {
    /// Trimmed tag text shown in the chip
    pub label: String,
    /// Style expression applied to the chip
    pub style: String,
}

/// Composite fragment inserted ahead of a record's content
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationFragment {
    pub chips: Vec<TagChip>,
}

impl AnnotationFragment {
    pub fn is_empty(&self) -> bool {
        self.chips.is_empty()
    }
}

/// Build the annotation for an identity: one chip per resolved tag, in
/// declaration order, duplicates preserved. An identity with no tags
/// yields an empty wrapper, which is still a valid insertion.
pub fn build_annotation(settings: &TaggerSettings, identity: &str) -> AnnotationFragment {
    let chips = tags::tags_for_player(&settings.player_tags, identity)
        .iter()
        .map(|tag| {
            let label = tag.trim().to_string();
            TagChip {
                style: tags::style_for_tag(&settings.tag_styles, &label),
                label,
            }
        })
        .collect();
    AnnotationFragment { chips }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::markup::DEFAULT_TAG_STYLE;

    fn test_settings(player_tags: &str, tag_styles: &str) -> TaggerSettings {
        TaggerSettings {
            player_tags: player_tags.to_string(),
            tag_styles: tag_styles.to_string(),
            ..TaggerSettings::default()
        }
    }

    #[test]
    fn test_build_one_chip_per_tag_in_order() {
        let settings = test_settings("bob:CLAN,VIP", "+CLAN=color:red;");
        let fragment = build_annotation(&settings, "Bob");

        assert_eq!(fragment.chips.len(), 2);
        assert_eq!(fragment.chips[0].label, "CLAN");
        assert_eq!(fragment.chips[0].style, "color:red;");
        assert_eq!(fragment.chips[1].label, "VIP");
        assert_eq!(fragment.chips[1].style, DEFAULT_TAG_STYLE);
    }

    #[test]
    fn test_build_trims_chip_labels() {
        let settings = test_settings("bob: CLAN , VIP ", "+CLAN=color:red;");
        let fragment = build_annotation(&settings, "bob");

        assert_eq!(fragment.chips[0].label, "CLAN");
        // Style lookup runs on the trimmed label
        assert_eq!(fragment.chips[0].style, "color:red;");
        assert_eq!(fragment.chips[1].label, "VIP");
    }

    #[test]
    fn test_build_duplicates_preserved() {
        let settings = test_settings("bob:X,X", "");
        let fragment = build_annotation(&settings, "bob");
        assert_eq!(fragment.chips.len(), 2);
        assert_eq!(fragment.chips[0], fragment.chips[1]);
    }

    #[test]
    fn test_build_unknown_identity_yields_empty_wrapper() {
        let settings = test_settings("bob:CLAN", "");
        let fragment = build_annotation(&settings, "Mallory");
        assert!(fragment.is_empty());
    }
}
