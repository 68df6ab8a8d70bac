//! Host tree capability surface
//!
//! The engine never touches the host's internal representation; it depends
//! only on the operations declared here, so a deterministic in-memory
//! double can stand in for the real tree (see [`memory`]).

pub mod memory;

use anyhow::Result;

use crate::annotation::AnnotationFragment;

/// Opaque reference to one node in the host tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle for a change-feed subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// Handle for a one-shot or repeating timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub(crate) u64);

/// Structural pattern matching record nodes within a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// Node carries the given class
    Class(&'static str),
    /// Node's element id starts with the given prefix
    IdPrefix(&'static str),
}

/// Notification delivered by the host to the engine's event pump
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Nodes were inserted somewhere under a watched subtree
    ChildrenAdded {
        subscription: SubscriptionId,
        nodes: Vec<NodeId>,
    },
    /// Nodes were detached from a watched subtree
    ChildrenRemoved {
        subscription: SubscriptionId,
        nodes: Vec<NodeId>,
    },
    /// A timer scheduled through the host fired
    TimerFired(TimerId),
}

/// Operations the engine needs from the tree it decorates
///
/// Mutations that allocate host resources are fallible; releases are
/// best-effort and never report. A stale handle is not an error condition.
pub trait HostTree {
    /// Locate a container by its stable element id
    fn locate(&self, element_id: &str) -> Option<NodeId>;

    /// Attached descendants of `root` matching `pattern`, in document order
    fn query(&self, root: NodeId, pattern: Pattern) -> Vec<NodeId>;

    /// First descendant of `node` matching `pattern`
    fn find_child(&self, node: NodeId, pattern: Pattern) -> Option<NodeId>;

    /// Concatenated text content of `node` and its descendants
    fn text(&self, node: NodeId) -> Option<String>;

    /// Whether `node` carries the boolean marker `key`
    fn marker(&self, node: NodeId, key: &str) -> bool;

    /// Set or clear the boolean marker `key` on `node`
    fn set_marker(&mut self, node: NodeId, key: &str, on: bool);

    /// Materialize `fragment` as the first child of `parent`; returns the
    /// wrapper node created for it
    fn insert_first(&mut self, parent: NodeId, fragment: AnnotationFragment) -> Result<NodeId>;

    /// Detach `node` and its subtree; no-op when the node is already gone
    fn remove(&mut self, node: NodeId);

    /// Whether `node` is currently attached to the tree
    fn contains(&self, node: NodeId) -> bool;

    /// Whether `node` sits inside the subtree rooted at `root`. Must keep
    /// answering for subtrees that were recently detached, since removal
    /// notifications are resolved against them.
    fn subtree_contains(&self, root: NodeId, node: NodeId) -> bool;

    /// Subscribe to child insertion/removal notifications under `root`
    fn watch_children(&mut self, root: NodeId) -> Result<SubscriptionId>;

    /// Cancel a change-feed subscription
    fn unwatch(&mut self, subscription: SubscriptionId);

    /// Schedule a one-shot timer `delay_ms` from now
    fn set_timeout(&mut self, delay_ms: u64) -> TimerId;

    /// Schedule a repeating timer with the given period
    fn set_interval(&mut self, period_ms: u64) -> TimerId;

    /// Cancel a timer; already-fired or unknown handles are ignored
    fn clear_timer(&mut self, timer: TimerId);
}
