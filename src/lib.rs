#![forbid(unsafe_code)]

//! Incremental annotation engine for chat messages and player nameplates.
//!
//! The host application owns a dynamically changing tree of display
//! records; this crate discovers records as they appear, decorates each
//! exactly once with user-configured tag chips, and reverses every
//! injection on settings change or shutdown. The tree is reached only
//! through the [`host::HostTree`] capability trait;
//! [`host::memory::MemoryTree`] is a deterministic in-memory stand-in used
//! by the tests and the simulator binary.

pub mod annotation;
pub mod constants;
pub mod host;
pub mod settings;
pub mod tagger;
pub mod tags;

pub use annotation::{build_annotation, AnnotationFragment, TagChip};
pub use host::{HostEvent, HostTree, NodeId, Pattern};
pub use settings::TaggerSettings;
pub use tagger::PlayerTagger;
