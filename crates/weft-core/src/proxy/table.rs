//! Proxy identity table
//!
//! Maps each native handle to the single live proxy bound to it. Entries
//! never keep a proxy alive on their own, except for *pinned* entries: a
//! proxy created by the bridge is pinned while native code holds extra
//! references to its object, so managed state attached to it survives even
//! when managed code drops every reference.
//!
//! The table lock is never held while a proxy could be dropped; removed pins
//! are handed back to the caller inside [`Evicted`].

use super::{Proxy, ProxyObject};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Weak};
use weft_sdk::NativeHandle;

/// How a proxy was registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Created by the bridge; eligible for pinning
    Strong,
    /// Wraps an object obtained from the engine
    Weak,
}

struct Entry {
    proxy: Weak<ProxyObject>,
    kind: EntryKind,
    pinned: Option<Proxy>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.proxy.strong_count() > 0
    }
}

/// A removed table entry
pub struct Evicted {
    /// Native handle of the entry
    pub handle: NativeHandle,
    /// Registration kind
    pub kind: EntryKind,
    proxy: Weak<ProxyObject>,
    pinned: Option<Proxy>,
}

impl Evicted {
    /// The proxy, if it is still alive
    pub fn proxy(&self) -> Option<Proxy> {
        self.proxy.upgrade()
    }

    /// Check if the entry was pinned when removed
    pub fn was_pinned(&self) -> bool {
        self.pinned.is_some()
    }
}

/// Native handle to proxy map
#[derive(Default)]
pub struct ProxyTable {
    entries: Mutex<FxHashMap<NativeHandle, Entry>>,
}

impl ProxyTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `proxy` to its handle.
    ///
    /// # Panics
    ///
    /// Panics if a different live proxy is already bound to the handle. Two
    /// proxies for one native object break identity for every caller, so
    /// this is treated as a bridge bug rather than a recoverable error.
    pub fn register(&self, proxy: &Proxy, kind: EntryKind) {
        let handle = proxy.handle();
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&handle) {
            if existing.is_live() && !std::ptr::eq(existing.proxy.as_ptr(), Arc::as_ptr(proxy)) {
                panic!("native handle {handle} is already bound to a live proxy");
            }
        }
        entries.insert(
            handle,
            Entry {
                proxy: Arc::downgrade(proxy),
                kind,
                pinned: None,
            },
        );
    }

    /// Bind `proxy` unless another live proxy already holds the handle, in
    /// which case that proxy is returned instead
    pub fn insert_or_get(&self, proxy: &Proxy, kind: EntryKind) -> Option<Proxy> {
        let handle = proxy.handle();
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&handle).and_then(|e| e.proxy.upgrade()) {
            return Some(existing);
        }
        entries.insert(
            handle,
            Entry {
                proxy: Arc::downgrade(proxy),
                kind,
                pinned: None,
            },
        );
        None
    }

    /// Find the live proxy for a handle
    pub fn lookup(&self, handle: NativeHandle) -> Option<Proxy> {
        self.entries
            .lock()
            .get(&handle)
            .and_then(|entry| entry.proxy.upgrade())
    }

    /// Registration kind of the entry for a handle
    pub fn kind_of(&self, handle: NativeHandle) -> Option<EntryKind> {
        self.entries.lock().get(&handle).map(|entry| entry.kind)
    }

    /// Check if the entry for a handle is pinned
    pub fn is_pinned(&self, handle: NativeHandle) -> bool {
        self.entries
            .lock()
            .get(&handle)
            .is_some_and(|entry| entry.pinned.is_some())
    }

    /// Remove the entry for `handle` if it belongs to `proxy`
    pub(crate) fn remove(&self, handle: NativeHandle, proxy: *const ProxyObject) -> Option<Evicted> {
        let mut entries = self.entries.lock();
        let owned = entries
            .get(&handle)
            .is_some_and(|entry| std::ptr::eq(entry.proxy.as_ptr(), proxy));
        if !owned {
            return None;
        }
        entries.remove(&handle).map(|entry| evicted(handle, entry))
    }

    /// Remove the entry for `handle`, whoever it belongs to
    pub fn remove_handle(&self, handle: NativeHandle) -> Option<Evicted> {
        self.entries
            .lock()
            .remove(&handle)
            .map(|entry| evicted(handle, entry))
    }

    /// Keep a strong entry's proxy alive; returns true if newly pinned
    pub fn pin(&self, handle: NativeHandle) -> bool {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(&handle) else {
            return false;
        };
        if entry.kind != EntryKind::Strong || entry.pinned.is_some() {
            return false;
        }
        match entry.proxy.upgrade() {
            Some(proxy) => {
                entry.pinned = Some(proxy);
                true
            }
            None => false,
        }
    }

    /// Drop a pin; the released proxy is returned so the caller can drop it
    /// outside the table lock
    #[must_use]
    pub fn unpin(&self, handle: NativeHandle) -> Option<Proxy> {
        self.entries
            .lock()
            .get_mut(&handle)
            .and_then(|entry| entry.pinned.take())
    }

    /// Remove every entry
    pub fn drain(&self) -> Vec<Evicted> {
        let entries = std::mem::take(&mut *self.entries.lock());
        entries
            .into_iter()
            .map(|(handle, entry)| evicted(handle, entry))
            .collect()
    }

    /// Remove entries whose proxy is gone; returns how many were removed
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live());
        before - entries.len()
    }

    /// Number of entries, dead ones included
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

fn evicted(handle: NativeHandle, entry: Entry) -> Evicted {
    Evicted {
        handle,
        kind: entry.kind,
        proxy: entry.proxy,
        pinned: entry.pinned,
    }
}
