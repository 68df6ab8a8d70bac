//! Deterministic in-memory host tree
//!
//! Backs the simulator binary and the engine tests: a small DOM-like node
//! store with a FIFO notification queue and a virtual millisecond clock.
//! Detached subtrees are retained so removal notifications can still be
//! resolved against them after the fact.

use std::collections::{HashMap, HashSet, VecDeque};

use anyhow::{bail, Result};

use super::{HostEvent, HostTree, NodeId, Pattern, SubscriptionId, TimerId};
use crate::annotation::AnnotationFragment;
use crate::constants::markup;

#[derive(Debug, Default)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    element_id: Option<String>,
    classes: Vec<String>,
    text: Option<String>,
    style: Option<String>,
    markers: HashSet<String>,
    attached: bool,
}

#[derive(Debug, Clone, Copy)]
enum TimerKind {
    Once,
    Repeating { period_ms: u64 },
}

#[derive(Debug)]
struct Timer {
    due_ms: u64,
    kind: TimerKind,
}

#[derive(Debug, Clone, Copy)]
enum Change {
    Added,
    Removed,
}

/// In-memory implementation of [`HostTree`]
#[derive(Debug)]
pub struct MemoryTree {
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    subscriptions: HashMap<SubscriptionId, NodeId>,
    timers: HashMap<TimerId, Timer>,
    events: VecDeque<HostEvent>,
    now_ms: u64,
    next_id: u64,
}

impl MemoryTree {
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            Node {
                attached: true,
                ..Node::default()
            },
        );
        Self {
            nodes,
            root,
            subscriptions: HashMap::new(),
            timers: HashMap::new(),
            events: VecDeque::new(),
            now_ms: 0,
            next_id: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn alloc_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Create and attach an element at the end of `parent`'s children,
    /// notifying every subscription watching `parent` or an ancestor.
    pub fn add_element(
        &mut self,
        parent: NodeId,
        element_id: Option<&str>,
        classes: &[&str],
        text: Option<&str>,
    ) -> NodeId {
        let id = NodeId(self.alloc_id());
        let attached = self.nodes.get(&parent).map(|n| n.attached).unwrap_or(false);
        self.nodes.insert(
            id,
            Node {
                parent: Some(parent),
                element_id: element_id.map(str::to_string),
                classes: classes.iter().map(|c| c.to_string()).collect(),
                text: text.map(str::to_string),
                attached,
                ..Node::default()
            },
        );
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(id);
        }
        if attached {
            self.notify(parent, vec![id], Change::Added);
        }
        id
    }

    /// Detach a node and its subtree, as the host does when a chat line
    /// scrolls out or a player despawns.
    pub fn remove_subtree(&mut self, node: NodeId) {
        self.detach(node);
    }

    /// Next queued notification, if any. The driver pumps these into the
    /// engine one at a time.
    pub fn pop_event(&mut self) -> Option<HostEvent> {
        self.events.pop_front()
    }

    /// Advance the virtual clock, firing due timers in due order.
    pub fn advance(&mut self, ms: u64) {
        let target = self.now_ms + ms;
        loop {
            let next = self
                .timers
                .iter()
                .filter(|(_, timer)| timer.due_ms <= target)
                .min_by_key(|(id, timer)| (timer.due_ms, id.0))
                .map(|(id, _)| *id);
            let Some(id) = next else { break };
            let Some(timer) = self.timers.get(&id) else { break };
            let (due, kind) = (timer.due_ms, timer.kind);

            self.now_ms = due.max(self.now_ms);
            match kind {
                TimerKind::Once => {
                    self.timers.remove(&id);
                }
                TimerKind::Repeating { period_ms } => {
                    if let Some(timer) = self.timers.get_mut(&id) {
                        timer.due_ms = due + period_ms;
                    }
                }
            }
            self.events.push_back(HostEvent::TimerFired(id));
        }
        self.now_ms = target;
    }

    /// A node's own text, without descendant content (the trait-level
    /// [`HostTree::text`] concatenates the whole subtree)
    pub fn own_text(&self, node: NodeId) -> Option<String> {
        self.nodes.get(&node).and_then(|n| n.text.clone())
    }

    /// Style expression attached to a node, if any
    pub fn style_of(&self, node: NodeId) -> Option<String> {
        self.nodes.get(&node).and_then(|n| n.style.clone())
    }

    pub fn children_of(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn detach(&mut self, node: NodeId) {
        let (parent, attached) = match self.nodes.get(&node) {
            Some(data) => (data.parent, data.attached),
            None => return,
        };
        if !attached {
            return;
        }
        if let Some(parent) = parent {
            if let Some(data) = self.nodes.get_mut(&parent) {
                data.children.retain(|c| *c != node);
            }
        }
        self.mark_detached(node);
        // Notification targets resolve against the pre-detach ancestor
        // chain, which is still intact above the old parent.
        if let Some(parent) = parent {
            self.notify(parent, vec![node], Change::Removed);
        }
    }

    fn mark_detached(&mut self, node: NodeId) {
        let children = self
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        if let Some(data) = self.nodes.get_mut(&node) {
            data.attached = false;
        }
        for child in children {
            self.mark_detached(child);
        }
    }

    fn notify(&mut self, from: NodeId, nodes: Vec<NodeId>, change: Change) {
        let mut targets: Vec<SubscriptionId> = self
            .subscriptions
            .iter()
            .filter(|(_, watched)| self.is_ancestor_or_self(**watched, from))
            .map(|(sub, _)| *sub)
            .collect();
        targets.sort_by_key(|sub| sub.0);
        for subscription in targets {
            let event = match change {
                Change::Added => HostEvent::ChildrenAdded {
                    subscription,
                    nodes: nodes.clone(),
                },
                Change::Removed => HostEvent::ChildrenRemoved {
                    subscription,
                    nodes: nodes.clone(),
                },
            };
            self.events.push_back(event);
        }
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    fn matches(node: &Node, pattern: Pattern) -> bool {
        match pattern {
            Pattern::Class(class) => node.classes.iter().any(|c| c == class),
            Pattern::IdPrefix(prefix) => node
                .element_id
                .as_deref()
                .is_some_and(|id| id.starts_with(prefix)),
        }
    }

    fn collect_matches(&self, node: NodeId, pattern: Pattern, out: &mut Vec<NodeId>) {
        let Some(data) = self.nodes.get(&node) else {
            return;
        };
        for &child in &data.children {
            if let Some(c) = self.nodes.get(&child) {
                if Self::matches(c, pattern) {
                    out.push(child);
                }
            }
            self.collect_matches(child, pattern, out);
        }
    }

    fn first_match(&self, node: NodeId, pattern: Pattern) -> Option<NodeId> {
        let data = self.nodes.get(&node)?;
        for &child in &data.children {
            if let Some(c) = self.nodes.get(&child) {
                if Self::matches(c, pattern) {
                    return Some(child);
                }
            }
            if let Some(found) = self.first_match(child, pattern) {
                return Some(found);
            }
        }
        None
    }

    fn append_text(&self, node: NodeId, out: &mut String) {
        let Some(data) = self.nodes.get(&node) else {
            return;
        };
        if let Some(text) = &data.text {
            out.push_str(text);
        }
        for &child in &data.children {
            self.append_text(child, out);
        }
    }
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl HostTree for MemoryTree {
    fn locate(&self, element_id: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.attached && n.element_id.as_deref() == Some(element_id))
            .map(|(id, _)| *id)
            .min()
    }

    fn query(&self, root: NodeId, pattern: Pattern) -> Vec<NodeId> {
        let mut out = Vec::new();
        if self.contains(root) {
            self.collect_matches(root, pattern, &mut out);
        }
        out
    }

    fn find_child(&self, node: NodeId, pattern: Pattern) -> Option<NodeId> {
        self.first_match(node, pattern)
    }

    fn text(&self, node: NodeId) -> Option<String> {
        if !self.nodes.contains_key(&node) {
            return None;
        }
        let mut out = String::new();
        self.append_text(node, &mut out);
        Some(out)
    }

    fn marker(&self, node: NodeId, key: &str) -> bool {
        self.nodes.get(&node).is_some_and(|n| n.markers.contains(key))
    }

    fn set_marker(&mut self, node: NodeId, key: &str, on: bool) {
        if let Some(data) = self.nodes.get_mut(&node) {
            if on {
                data.markers.insert(key.to_string());
            } else {
                data.markers.remove(key);
            }
        }
    }

    fn insert_first(&mut self, parent: NodeId, fragment: AnnotationFragment) -> Result<NodeId> {
        match self.nodes.get(&parent) {
            Some(data) if data.attached => {}
            Some(_) => bail!("insert target {parent} is detached"),
            None => bail!("insert target {parent} does not exist"),
        }

        let wrapper = NodeId(self.alloc_id());
        self.nodes.insert(
            wrapper,
            Node {
                parent: Some(parent),
                classes: vec![markup::ANNOTATION_CLASS.to_string()],
                attached: true,
                ..Node::default()
            },
        );
        for chip in fragment.chips {
            let chip_id = NodeId(self.alloc_id());
            self.nodes.insert(
                chip_id,
                Node {
                    parent: Some(wrapper),
                    classes: vec![markup::CHIP_CLASS.to_string()],
                    text: Some(chip.label),
                    style: Some(chip.style),
                    attached: true,
                    ..Node::default()
                },
            );
            if let Some(data) = self.nodes.get_mut(&wrapper) {
                data.children.push(chip_id);
            }
        }
        if let Some(data) = self.nodes.get_mut(&parent) {
            data.children.insert(0, wrapper);
        }
        self.notify(parent, vec![wrapper], Change::Added);
        Ok(wrapper)
    }

    fn remove(&mut self, node: NodeId) {
        self.detach(node);
    }

    fn contains(&self, node: NodeId) -> bool {
        self.nodes.get(&node).is_some_and(|n| n.attached)
    }

    fn subtree_contains(&self, root: NodeId, node: NodeId) -> bool {
        self.is_ancestor_or_self(root, node)
    }

    fn watch_children(&mut self, root: NodeId) -> Result<SubscriptionId> {
        if !self.contains(root) {
            bail!("watch target {root} does not exist");
        }
        let id = SubscriptionId(self.alloc_id());
        self.subscriptions.insert(id, root);
        Ok(id)
    }

    fn unwatch(&mut self, subscription: SubscriptionId) {
        self.subscriptions.remove(&subscription);
    }

    fn set_timeout(&mut self, delay_ms: u64) -> TimerId {
        let id = TimerId(self.alloc_id());
        self.timers.insert(
            id,
            Timer {
                due_ms: self.now_ms + delay_ms,
                kind: TimerKind::Once,
            },
        );
        id
    }

    fn set_interval(&mut self, period_ms: u64) -> TimerId {
        let period_ms = period_ms.max(1);
        let id = TimerId(self.alloc_id());
        self.timers.insert(
            id,
            Timer {
                due_ms: self.now_ms + period_ms,
                kind: TimerKind::Repeating { period_ms },
            },
        );
        id
    }

    fn clear_timer(&mut self, timer: TimerId) {
        self.timers.remove(&timer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::TagChip;

    fn chip(label: &str, style: &str) -> TagChip {
        TagChip {
            label: label.to_string(),
            style: style.to_string(),
        }
    }

    #[test]
    fn test_locate_and_query_by_class() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let list = tree.add_element(root, Some("list"), &[], None);
        let a = tree.add_element(list, None, &["record"], None);
        let b = tree.add_element(list, None, &["record"], None);
        tree.add_element(list, None, &["other"], None);

        assert_eq!(tree.locate("list"), Some(list));
        assert_eq!(tree.locate("missing"), None);
        assert_eq!(tree.query(list, Pattern::Class("record")), vec![a, b]);
    }

    #[test]
    fn test_query_by_id_prefix_spans_depth() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let container = tree.add_element(root, Some("plates"), &[], None);
        let inner = tree.add_element(container, None, &[], None);
        let plate = tree.add_element(inner, Some("plates-player-bob"), &[], Some("Bob"));

        assert_eq!(tree.query(container, Pattern::IdPrefix("plates-player")), vec![plate]);
    }

    #[test]
    fn test_text_concatenates_subtree() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let record = tree.add_element(root, None, &[], Some("From "));
        tree.add_element(record, None, &[], Some("Bob:"));

        assert_eq!(tree.text(record).as_deref(), Some("From Bob:"));
        assert_eq!(tree.own_text(record).as_deref(), Some("From "));
    }

    #[test]
    fn test_insertion_notifies_ancestor_watcher() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let list = tree.add_element(root, Some("list"), &[], None);
        let container = tree.add_element(list, Some("container"), &[], None);
        let subscription = tree.watch_children(list).unwrap();

        let record = tree.add_element(container, None, &["record"], None);
        assert_eq!(
            tree.pop_event(),
            Some(HostEvent::ChildrenAdded {
                subscription,
                nodes: vec![record],
            })
        );
        assert_eq!(tree.pop_event(), None);
    }

    #[test]
    fn test_unwatch_stops_notifications() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let list = tree.add_element(root, Some("list"), &[], None);
        let subscription = tree.watch_children(list).unwrap();
        tree.unwatch(subscription);

        tree.add_element(list, None, &["record"], None);
        assert_eq!(tree.pop_event(), None);
    }

    #[test]
    fn test_removal_notifies_and_retains_subtree() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let list = tree.add_element(root, Some("list"), &[], None);
        let record = tree.add_element(list, None, &["record"], None);
        let inner = tree.add_element(record, None, &[], Some("Bob"));
        let subscription = tree.watch_children(list).unwrap();

        tree.remove_subtree(record);

        assert_eq!(
            tree.pop_event(),
            Some(HostEvent::ChildrenRemoved {
                subscription,
                nodes: vec![record],
            })
        );
        assert!(!tree.contains(record));
        assert!(!tree.contains(inner));
        // The detached subtree still answers membership queries
        assert!(tree.subtree_contains(record, inner));
        assert!(!tree.subtree_contains(record, list));
    }

    #[test]
    fn test_insert_first_materializes_chips_ahead_of_content() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let record = tree.add_element(root, None, &["record"], Some("Bob"));
        let existing = tree.add_element(record, None, &[], Some("hello"));

        let wrapper = tree
            .insert_first(
                record,
                AnnotationFragment {
                    chips: vec![chip("CLAN", "color:red;"), chip("VIP", "plain")],
                },
            )
            .unwrap();

        assert_eq!(tree.children_of(record), vec![wrapper, existing]);
        let chips = tree.query(record, Pattern::Class(markup::CHIP_CLASS));
        assert_eq!(chips.len(), 2);
        assert_eq!(tree.own_text(chips[0]).as_deref(), Some("CLAN"));
        assert_eq!(tree.style_of(chips[0]).as_deref(), Some("color:red;"));
        assert_eq!(tree.style_of(chips[1]).as_deref(), Some("plain"));
    }

    #[test]
    fn test_insert_into_detached_node_fails() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let record = tree.add_element(root, None, &["record"], None);
        tree.remove_subtree(record);

        assert!(tree.insert_first(record, AnnotationFragment::default()).is_err());
    }

    #[test]
    fn test_timers_fire_in_due_order() {
        let mut tree = MemoryTree::new();
        let once = tree.set_timeout(10);
        let repeating = tree.set_interval(500);

        tree.advance(1000);

        assert_eq!(tree.pop_event(), Some(HostEvent::TimerFired(once)));
        assert_eq!(tree.pop_event(), Some(HostEvent::TimerFired(repeating)));
        assert_eq!(tree.pop_event(), Some(HostEvent::TimerFired(repeating)));
        assert_eq!(tree.pop_event(), None);
        assert_eq!(tree.now_ms(), 1000);
    }

    #[test]
    fn test_cleared_timer_never_fires() {
        let mut tree = MemoryTree::new();
        let timer = tree.set_interval(100);
        tree.clear_timer(timer);

        tree.advance(1000);
        assert_eq!(tree.pop_event(), None);
    }
}
