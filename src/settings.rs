//! Plugin settings surface
//!
//! The settings collaborator owns persistence and the editing UI; the
//! engine only ever receives whole-record snapshots and treats them as
//! read-only. A field change arrives through
//! [`crate::tagger::PlayerTagger::settings_changed`].

use serde::{Deserialize, Serialize};

/// User-facing configuration for the tagger engine
///
/// `player_tags` format: `identity:tag1,tag2;identity2:tag1,tag2;`
/// `tag_styles` format: `+tag=styleExpr +tag2=styleExpr`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggerSettings {
    /// Global enable flag for the whole plugin
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Annotate chat message records
    #[serde(default = "default_enabled")]
    pub tag_chat: bool,

    /// Annotate nameplate records
    #[serde(default = "default_enabled")]
    pub tag_nameplates: bool,

    /// Identity → tag list map
    #[serde(default = "default_player_tags")]
    pub player_tags: String,

    /// Tag → style expression map
    #[serde(default = "default_tag_styles")]
    pub tag_styles: String,
}

// Default value functions
fn default_enabled() -> bool {
    true
}

fn default_player_tags() -> String {
    "ExampleUsername:CLAN⚔️,Example Tag".to_string()
}

fn default_tag_styles() -> String {
    "+CLAN⚔️=font-weight:300;background:rgba(230,230,250,200);border:2px solid rgba(75,0,130,255);border-radius:2px;text-align: center;padding:2px 2px;margin-right:2px;color:rgba(75,0,130,255);font-size: x-small; line-height:2;".to_string()
}

impl Default for TaggerSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            tag_chat: default_enabled(),
            tag_nameplates: default_enabled(),
            player_tags: default_player_tags(),
            tag_styles: default_tag_styles(),
        }
    }
}
