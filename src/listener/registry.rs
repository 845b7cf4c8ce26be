use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::ChildListener;
use crate::DataListener;
use crate::StateListener;

/// Path-keyed listener sets plus the global state-listener set.
///
/// Owned exclusively by one client instance. Sets deduplicate by listener
/// identity (`Arc::ptr_eq`). A path whose set drains is removed entirely:
/// its presence is what makes subsequent reads request a watch.
pub(crate) struct ListenerRegistry {
    data: DashMap<String, Vec<Arc<dyn DataListener>>>,
    children: DashMap<String, Vec<Arc<dyn ChildListener>>>,
    state: RwLock<Vec<Arc<dyn StateListener>>>,
}

fn insert_unique<T: ?Sized>(
    set: &mut Vec<Arc<T>>,
    listener: &Arc<T>,
) {
    if !set.iter().any(|l| Arc::ptr_eq(l, listener)) {
        set.push(listener.clone());
    }
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            data: DashMap::new(),
            children: DashMap::new(),
            state: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn subscribe_data(
        &self,
        path: &str,
        listener: &Arc<dyn DataListener>,
    ) {
        insert_unique(self.data.entry(path.to_string()).or_default().value_mut(), listener);
    }

    pub(crate) fn unsubscribe_data(
        &self,
        path: &str,
        listener: &Arc<dyn DataListener>,
    ) {
        if let Entry::Occupied(mut entry) = self.data.entry(path.to_string()) {
            entry.get_mut().retain(|l| !Arc::ptr_eq(l, listener));
            if entry.get().is_empty() {
                entry.remove();
            }
        }
    }

    pub(crate) fn subscribe_children(
        &self,
        path: &str,
        listener: &Arc<dyn ChildListener>,
    ) {
        insert_unique(
            self.children.entry(path.to_string()).or_default().value_mut(),
            listener,
        );
    }

    pub(crate) fn unsubscribe_children(
        &self,
        path: &str,
        listener: &Arc<dyn ChildListener>,
    ) {
        if let Entry::Occupied(mut entry) = self.children.entry(path.to_string()) {
            entry.get_mut().retain(|l| !Arc::ptr_eq(l, listener));
            if entry.get().is_empty() {
                entry.remove();
            }
        }
    }

    pub(crate) fn subscribe_state(
        &self,
        listener: &Arc<dyn StateListener>,
    ) {
        insert_unique(&mut self.state.write(), listener);
    }

    pub(crate) fn unsubscribe_state(
        &self,
        listener: &Arc<dyn StateListener>,
    ) {
        self.state.write().retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Whether any data or child listener is registered for `path`. Drives
    /// the decision to request a watch on reads.
    pub(crate) fn has_listeners(
        &self,
        path: &str,
    ) -> bool {
        self.data.get(path).map_or(false, |set| !set.is_empty())
            || self.children.get(path).map_or(false, |set| !set.is_empty())
    }

    pub(crate) fn data_listeners(
        &self,
        path: &str,
    ) -> Vec<Arc<dyn DataListener>> {
        self.data.get(path).map(|set| set.clone()).unwrap_or_default()
    }

    pub(crate) fn child_listeners(
        &self,
        path: &str,
    ) -> Vec<Arc<dyn ChildListener>> {
        self.children.get(path).map(|set| set.clone()).unwrap_or_default()
    }

    pub(crate) fn state_listeners(&self) -> Vec<Arc<dyn StateListener>> {
        self.state.read().clone()
    }

    /// Snapshot of every path with at least one data listener.
    pub(crate) fn data_paths(&self) -> Vec<String> {
        self.data.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Snapshot of every path with at least one child listener.
    pub(crate) fn child_paths(&self) -> Vec<String> {
        self.children.iter().map(|entry| entry.key().clone()).collect()
    }

    pub(crate) fn clear(&self) {
        self.data.clear();
        self.children.clear();
        self.state.write().clear();
    }

    /// Total listener count across all registries.
    pub(crate) fn len(&self) -> usize {
        let data: usize = self.data.iter().map(|entry| entry.value().len()).sum();
        let children: usize = self.children.iter().map(|entry| entry.value().len()).sum();
        data + children + self.state.read().len()
    }
}
