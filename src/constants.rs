//! Engine-wide constants
//!
//! This module contains the selector names, structural patterns, timing
//! values and markup defaults used throughout the engine, providing a
//! single source of truth for constant values.

/// Stable element ids of the host containers this engine works against
pub mod selectors {
    /// Public chat record list (change-feed subscription scope)
    pub const PUBLIC_MESSAGE_LIST: &str = "hs-public-message-list";

    /// Public chat record container (scan root inside the public list)
    pub const PUBLIC_MESSAGE_CONTAINER: &str = "hs-public-message-list__container";

    /// Private chat list; doubles as subscription scope and scan root
    pub const PRIVATE_MESSAGE_LIST: &str = "hs-private-message-list";

    /// Nameplate overlay container (poll-only, the host exposes no change feed here)
    pub const NAMEPLATE_CONTAINER: &str = "highlite-nameplates";
}

/// Structural patterns identifying records and their sub-fields
pub mod patterns {
    /// Class carried by every chat message record
    pub const MESSAGE_RECORD_CLASS: &str = "hs-chat-message-container";

    /// Primary player-name sub-field inside a chat record
    pub const PLAYER_NAME_CLASS: &str = "hs-chat-menu__player-name";

    /// Fallback sub-field when the player-name element is absent
    pub const PRE_TEXT_CLASS: &str = "hs-chat-menu__pre-text";

    /// Element-id prefix of per-player nameplate records
    pub const NAMEPLATE_RECORD_PREFIX: &str = "highlite-nameplates-player";
}

/// Tokens stripped while extracting a sender identity from chat text
pub mod identity {
    /// Role phrase prefixing private-message sender names ("From Bob:")
    pub const ROLE_PREFIX: &str = "From ";

    /// Separator trailing chat sender names
    pub const NAME_SEPARATOR: char = ':';
}

/// Timing values, in host timer milliseconds
pub mod timing {
    /// Delay between an insertion notification and the rescan it schedules,
    /// giving the host time to finish multi-step record construction
    pub const DEFERRED_SCAN_DELAY_MS: u64 = 10;

    /// Poll period covering records the change feed missed (and nameplates,
    /// which have no change feed at all)
    pub const POLL_INTERVAL_MS: u64 = 500;
}

/// Annotation markup constants
pub mod markup {
    /// Idempotency marker set on every record the engine has visited
    pub const INJECTED_MARKER: &str = "player-tag-injected";

    /// Class of the wrapper fragment holding a record's chips
    pub const ANNOTATION_CLASS: &str = "player-tag";

    /// Class of one tag chip inside the wrapper
    pub const CHIP_CLASS: &str = "player-tag__chip";

    /// Chip style applied when the style map has no entry for a tag
    pub const DEFAULT_TAG_STYLE: &str = "background:rgba(0.1,0.1,0.1,0.6) ; border-radius:2px; border:2px solid rgba(0, 0, 0, 1); text-align: center;padding:2px 2px;margin-right:2px;color:white;font-weight: 300; line-height: 2; font-size: x-small;";
}

/// Chat watch pairs: (record list to subscribe on, record container to scan)
pub const CHAT_WATCH_PAIRS: [(&str, &str); 2] = [
    (
        selectors::PUBLIC_MESSAGE_LIST,
        selectors::PUBLIC_MESSAGE_CONTAINER,
    ),
    (
        selectors::PRIVATE_MESSAGE_LIST,
        selectors::PRIVATE_MESSAGE_LIST,
    ),
];
