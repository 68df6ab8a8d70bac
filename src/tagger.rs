//! Annotation synchronization engine
//!
//! Discovers newly appeared chat and nameplate records in the host tree,
//! decorates each exactly once with the configured tag chips, and reverses
//! every injection on settings change or shutdown. Two independent stimuli
//! drive discovery: change-feed notifications (chat only) and a
//! fixed-period poll, both funnelling into the same idempotent scan.

use std::collections::HashSet;

use anyhow::Result;
use tracing::{debug, info};

use crate::annotation;
use crate::constants::{identity, markup, patterns, selectors, timing, CHAT_WATCH_PAIRS};
use crate::host::{HostEvent, HostTree, NodeId, Pattern, SubscriptionId, TimerId};
use crate::settings::TaggerSettings;

/// One armed change-feed subscription and the container it covers
#[derive(Debug, Clone, Copy)]
struct WatchRegistration {
    subscription: SubscriptionId,
    container: NodeId,
}

/// Record kinds the engine knows how to annotate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordKind {
    Message,
    Nameplate,
}

/// Incremental annotation engine for chat messages and player nameplates
///
/// All state is instance-scoped; repeated init/stop cycles and multiple
/// engines against the same host stay independently correct.
#[derive(Debug)]
pub struct PlayerTagger {
    settings: TaggerSettings,
    initialized: bool,
    message_watchers_armed: bool,
    nameplate_watchers_armed: bool,

    /// Records already visited this arm cycle, by node identity
    processed: HashSet<NodeId>,
    /// Wrapper fragments this engine inserted and still owns
    injected: HashSet<NodeId>,

    watches: Vec<WatchRegistration>,
    message_poll: Option<TimerId>,
    nameplate_poll: Option<TimerId>,
    /// One-shot rescan timers scheduled from insertion notifications
    pending_rescans: HashSet<TimerId>,
}

impl PlayerTagger {
    pub fn new(settings: TaggerSettings) -> Self {
        Self {
            settings,
            initialized: false,
            message_watchers_armed: false,
            nameplate_watchers_armed: false,
            processed: HashSet::new(),
            injected: HashSet::new(),
            watches: Vec::new(),
            message_poll: None,
            nameplate_poll: None,
            pending_rescans: HashSet::new(),
        }
    }

    pub fn settings(&self) -> &TaggerSettings {
        &self.settings
    }

    /// Read the settings and arm the enabled watchers
    pub fn init(&mut self, host: &mut impl HostTree) -> Result<()> {
        info!("initializing player tagger");
        if !self.settings.enabled {
            return Ok(());
        }
        self.initialized = true;
        if self.settings.tag_chat {
            self.setup_message_watching(host)?;
        }
        if self.settings.tag_nameplates {
            self.setup_nameplate_watching(host)?;
        }
        Ok(())
    }

    /// Readiness signal only; all arming happens in `init`
    pub fn start(&self) {
        info!("started player tagger");
    }

    /// Full teardown: subscriptions, timers, injected fragments, tracking state
    pub fn stop(&mut self, host: &mut impl HostTree) {
        info!("stopping player tagger");
        self.teardown(host);
        self.initialized = false;
    }

    /// Entry point for host notifications and timer callbacks
    pub fn handle_event(&mut self, host: &mut impl HostTree, event: HostEvent) -> Result<()> {
        match event {
            HostEvent::ChildrenAdded { nodes, .. } => {
                if !nodes.is_empty() {
                    // Scan after a short delay instead of synchronously, so
                    // the host can finish multi-step record construction.
                    let timer = host.set_timeout(timing::DEFERRED_SCAN_DELAY_MS);
                    self.pending_rescans.insert(timer);
                }
            }
            HostEvent::ChildrenRemoved { subscription, nodes } => {
                self.evict_removed(host, subscription, &nodes);
            }
            HostEvent::TimerFired(timer) => {
                if self.message_poll == Some(timer) {
                    self.scan_messages(host)?;
                } else if self.nameplate_poll == Some(timer) {
                    self.scan_nameplates(host)?;
                } else if self.pending_rescans.remove(&timer) {
                    self.scan_messages(host)?;
                }
                // Anything else is a stale handle from a previous arm
                // cycle; torn-down state ignores it.
            }
        }
        Ok(())
    }

    /// React to any configuration field change: clear existing annotations
    /// so new identities and styles take effect on already-seen records,
    /// then rediscover. Change feeds stay subscribed.
    pub fn settings_changed(
        &mut self,
        host: &mut impl HostTree,
        settings: TaggerSettings,
    ) -> Result<()> {
        info!("settings changed, re-annotating");
        self.settings = settings;
        self.clear_annotations(host);
        if self.settings.tag_chat {
            self.scan_messages(host)?;
        }
        if self.settings.tag_nameplates {
            self.scan_nameplates(host)?;
        }
        Ok(())
    }

    /// Discover and annotate chat records in every resolvable container.
    ///
    /// The enable guard is re-checked on each call: toggles can flip
    /// between scheduling and execution of a deferred scan.
    pub fn scan_messages(&mut self, host: &mut impl HostTree) -> Result<()> {
        if !self.can_scan(RecordKind::Message) {
            return Ok(());
        }
        let mut found = 0usize;
        for container_id in [
            selectors::PUBLIC_MESSAGE_CONTAINER,
            selectors::PRIVATE_MESSAGE_LIST,
        ] {
            let Some(container) = host.locate(container_id) else {
                continue;
            };
            found += self.process_messages(host, container)?;
        }
        if found > 0 {
            debug!(found, "annotated new chat records");
            self.prune(host);
        }
        Ok(())
    }

    /// Discover and annotate nameplate records; poll-driven only
    pub fn scan_nameplates(&mut self, host: &mut impl HostTree) -> Result<()> {
        if !self.can_scan(RecordKind::Nameplate) {
            return Ok(());
        }
        let Some(container) = host.locate(selectors::NAMEPLATE_CONTAINER) else {
            return Ok(());
        };
        let mut found = 0usize;
        for record in host.query(container, Pattern::IdPrefix(patterns::NAMEPLATE_RECORD_PREFIX)) {
            if self.processed.contains(&record) || host.marker(record, markup::INJECTED_MARKER) {
                continue;
            }
            found += 1;
            self.processed.insert(record);

            let player = host
                .text(record)
                .unwrap_or_default()
                .trim()
                .to_string();
            let fragment = annotation::build_annotation(&self.settings, &player);

            host.set_marker(record, markup::INJECTED_MARKER, true);
            let injected = host.insert_first(record, fragment)?;
            self.injected.insert(injected);
            debug!(%record, player = %player, "annotated nameplate");
        }
        if found > 0 {
            debug!(found, "annotated new nameplates");
            self.prune(host);
        }
        Ok(())
    }

    fn setup_message_watching(&mut self, host: &mut impl HostTree) -> Result<()> {
        if self.message_watchers_armed {
            return Ok(());
        }
        self.message_watchers_armed = true;

        self.scan_messages(host)?;

        for (list_id, container_id) in CHAT_WATCH_PAIRS {
            let (Some(list), Some(container)) = (host.locate(list_id), host.locate(container_id))
            else {
                continue;
            };
            let subscription = host.watch_children(list)?;
            self.watches.push(WatchRegistration {
                subscription,
                container,
            });
            debug!(list = list_id, %container, "armed chat change feed");
        }

        self.message_poll = Some(host.set_interval(timing::POLL_INTERVAL_MS));
        Ok(())
    }

    fn setup_nameplate_watching(&mut self, host: &mut impl HostTree) -> Result<()> {
        if self.nameplate_watchers_armed {
            return Ok(());
        }
        self.nameplate_watchers_armed = true;

        self.scan_nameplates(host)?;

        // The host exposes no change feed for the nameplate overlay; the
        // poll is the only discovery stimulus for this kind.
        self.nameplate_poll = Some(host.set_interval(timing::POLL_INTERVAL_MS));
        Ok(())
    }

    fn can_scan(&self, kind: RecordKind) -> bool {
        if !self.settings.enabled || !self.initialized {
            return false;
        }
        match kind {
            RecordKind::Message => self.settings.tag_chat,
            RecordKind::Nameplate => self.settings.tag_nameplates,
        }
    }

    fn process_messages(&mut self, host: &mut impl HostTree, container: NodeId) -> Result<usize> {
        let mut found = 0usize;
        for record in host.query(container, Pattern::Class(patterns::MESSAGE_RECORD_CLASS)) {
            if self.processed.contains(&record) || host.marker(record, markup::INJECTED_MARKER) {
                continue;
            }
            found += 1;
            self.processed.insert(record);

            let name_field = host
                .find_child(record, Pattern::Class(patterns::PLAYER_NAME_CLASS))
                .or_else(|| host.find_child(record, Pattern::Class(patterns::PRE_TEXT_CLASS)));

            let Some(name_field) = name_field else {
                // Neither name sub-field exists; mark the record anyway so
                // it is not retried on every scan.
                host.set_marker(record, markup::INJECTED_MARKER, true);
                continue;
            };

            let raw = host.text(name_field).unwrap_or_default();
            let player = chat_identity(&raw);
            let fragment = annotation::build_annotation(&self.settings, &player);

            host.set_marker(record, markup::INJECTED_MARKER, true);
            let injected = host.insert_first(name_field, fragment)?;
            self.injected.insert(injected);
            debug!(%record, player = %player, "annotated chat record");
        }
        Ok(found)
    }

    /// Drop registry entries for fragments that vanished with a removed
    /// subtree. The processed set is left alone; pruning handles it.
    fn evict_removed(
        &mut self,
        host: &impl HostTree,
        subscription: SubscriptionId,
        removed: &[NodeId],
    ) {
        if self.injected.is_empty() {
            return;
        }
        let before = self.injected.len();
        self.injected.retain(|fragment| {
            !removed
                .iter()
                .any(|root| host.subtree_contains(*root, *fragment))
        });
        let evicted = before - self.injected.len();
        if evicted > 0 {
            let container = self
                .watches
                .iter()
                .find(|watch| watch.subscription == subscription)
                .map(|watch| watch.container);
            debug!(evicted, container = ?container, "evicted fragments under removed subtree");
        }
    }

    /// Opportunistic cleanup after a scan found new records: drop tracking
    /// entries whose node no longer exists in the host tree.
    fn prune(&mut self, host: &impl HostTree) {
        let before = self.processed.len() + self.injected.len();
        self.processed.retain(|record| host.contains(*record));
        self.injected.retain(|fragment| host.contains(*fragment));
        let dropped = before - self.processed.len() - self.injected.len();
        if dropped > 0 {
            debug!(dropped, "pruned tracking entries for vanished records");
        }
    }

    /// Remove every fragment this engine inserted and forget every visited
    /// record, clearing the idempotency marker on records still present so
    /// a rescan can annotate them again.
    fn clear_annotations(&mut self, host: &mut impl HostTree) {
        for fragment in self.injected.drain() {
            host.remove(fragment);
        }
        for record in self.processed.drain() {
            host.set_marker(record, markup::INJECTED_MARKER, false);
        }
    }

    /// Disarm: cancel subscriptions and timers, reverse every injection,
    /// reset tracking state. Safe to call when already disarmed.
    fn teardown(&mut self, host: &mut impl HostTree) {
        for watch in self.watches.drain(..) {
            host.unwatch(watch.subscription);
        }
        if let Some(timer) = self.message_poll.take() {
            host.clear_timer(timer);
        }
        if let Some(timer) = self.nameplate_poll.take() {
            host.clear_timer(timer);
        }
        // Deferred rescans are not cancellable once scheduled; their
        // handles are forgotten and the scan guard absorbs late firings.
        self.pending_rescans.clear();

        self.clear_annotations(host);

        self.message_watchers_armed = false;
        self.nameplate_watchers_armed = false;
        info!("player tagger cleanup complete");
    }
}

/// Extract the sender identity from a chat name sub-field: one leading
/// role phrase and one trailing separator are stripped, whitespace trimmed.
fn chat_identity(raw: &str) -> String {
    let text = raw.trim();
    let text = text.strip_prefix(identity::ROLE_PREFIX).unwrap_or(text);
    let text = text.strip_suffix(identity::NAME_SEPARATOR).unwrap_or(text);
    text.trim().to_string()
}
