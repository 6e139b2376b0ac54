//! Listener registrations on elements
//!
//! Registrations are weak: an element never keeps a listener alive, and a
//! listener that has been dropped is pruned the next time its element
//! notifies or gains a listener.

use std::fmt;
use std::sync::{Arc, Weak};

use ember_codec::RelativeOid;
use tokio::sync::mpsc;

use crate::element::{ElementId, ElementTree};
use crate::error::TreeError;

/// Receiver of element update notifications
///
/// Callbacks run synchronously inside the merge that triggered them and must
/// not block; long work belongs on another task.
pub trait Listener: Send + Sync {
    /// Called after `element` was updated, with the first error of the
    /// update or `None` on success
    fn receive(&self, tree: &ElementTree, element: ElementId, error: Option<&TreeError>);
}

/// Set of weak listener registrations keyed by listener identity
#[derive(Default)]
pub struct ListenerSet {
    entries: Vec<Weak<dyn Listener>>,
}

fn same_listener(entry: &Weak<dyn Listener>, listener: &Arc<dyn Listener>) -> bool {
    entry.as_ptr() as *const () == Arc::as_ptr(listener) as *const ()
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`; registering twice has no effect
    ///
    /// Registrations whose listener has been dropped are pruned first.
    pub fn insert(&mut self, listener: &Arc<dyn Listener>) {
        self.entries.retain(|entry| entry.strong_count() > 0);
        if !self.contains(listener) {
            self.entries.push(Arc::downgrade(listener));
        }
    }

    /// Remove `listener`; removing an absent listener has no effect
    pub fn remove(&mut self, listener: &Arc<dyn Listener>) {
        self.entries.retain(|entry| !same_listener(entry, listener));
    }

    pub fn contains(&self, listener: &Arc<dyn Listener>) -> bool {
        self.entries.iter().any(|entry| same_listener(entry, listener))
    }

    /// Number of registrations whose listener is still alive
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Upgrade every live registration, dropping the dead ones
    pub(crate) fn live(&mut self) -> Vec<Arc<dyn Listener>> {
        self.entries.retain(|entry| entry.strong_count() > 0);
        self.entries.iter().filter_map(Weak::upgrade).collect()
    }
}

impl fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("live", &self.len())
            .finish()
    }
}

/// Outcome delivered by a [`ChannelListener`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub element: ElementId,
    pub path: RelativeOid,
    pub error: Option<TreeError>,
}

/// Listener that forwards every notification over an unbounded channel
///
/// Lets an async caller await the response to a directory request without
/// doing work inside the merge.
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelListener {
    /// Create the listener and the receiving end of its channel
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl Listener for ChannelListener {
    fn receive(&self, tree: &ElementTree, element: ElementId, error: Option<&TreeError>) {
        let path = tree.path(element).unwrap_or_default();
        let notification = Notification {
            element,
            path,
            error: error.cloned(),
        };
        if self.tx.send(notification).is_err() {
            tracing::debug!(?element, "notification receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        calls: AtomicUsize,
    }

    impl Listener for Counter {
        fn receive(&self, _tree: &ElementTree, _element: ElementId, _error: Option<&TreeError>) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_insert_is_idempotent() {
        let counter = Arc::new(Counter::default());
        let listener: Arc<dyn Listener> = counter.clone();
        let mut set = ListenerSet::new();
        set.insert(&listener);
        set.insert(&listener);
        assert_eq!(set.len(), 1);

        let mut tree = ElementTree::new();
        let id = tree.create(tags::NODE, 1, None);
        for live in set.live() {
            live.receive(&tree, id, None);
        }
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);

        set.remove(&listener);
        set.remove(&listener);
        assert!(set.is_empty());
    }

    #[test]
    fn test_distinct_listeners() {
        let a: Arc<dyn Listener> = Arc::new(Counter::default());
        let b: Arc<dyn Listener> = Arc::new(Counter::default());
        let mut set = ListenerSet::new();
        set.insert(&a);
        set.insert(&b);
        assert_eq!(set.len(), 2);

        set.remove(&a);
        assert!(!set.contains(&a));
        assert!(set.contains(&b));
    }

    #[test]
    fn test_dropped_listener_is_pruned() {
        let listener: Arc<dyn Listener> = Arc::new(Counter::default());
        let mut set = ListenerSet::new();
        set.insert(&listener);
        drop(listener);

        assert_eq!(set.len(), 0);
        assert!(set.live().is_empty());
        assert!(set.entries.is_empty());
    }

    #[test]
    fn test_requests_with_dropped_listeners_do_not_accumulate() {
        let mut tree = ElementTree::new();
        let id = tree.create(tags::NODE, 1, None);
        tree.add_root(id).unwrap();

        for _ in 0..1000 {
            let listener: Arc<dyn Listener> = Arc::new(Counter::default());
            tree.get_directory_msg(id, Some(&listener)).unwrap();
        }

        let listeners = &tree.element(id).unwrap().listeners;
        assert_eq!(listeners.len(), 0);
        assert!(listeners.entries.len() <= 1);

        let kept: Arc<dyn Listener> = Arc::new(Counter::default());
        tree.add_listener(id, &kept).unwrap();
        let listeners = &tree.element(id).unwrap().listeners;
        assert_eq!(listeners.entries.len(), 1);
        assert!(listeners.contains(&kept));
    }
}
