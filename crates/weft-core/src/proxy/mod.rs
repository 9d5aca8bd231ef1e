//! Proxy objects
//!
//! A [`ProxyObject`] is the managed face of one native object. It either
//! *owns* a native reference (released exactly once, on disposal or drop) or
//! merely *observes* an object whose lifetime the engine controls, in which
//! case the engine tells the bridge when the object goes away.
//!
//! Proxies are created by the [`Bridge`](crate::Bridge); the bridge's proxy
//! table guarantees at most one live proxy per native handle.

mod table;

pub use table::{EntryKind, Evicted, ProxyTable};

use crate::bridge::{Bridge, BridgeInner};
use crate::error::{BridgeError, BridgeResult};
use crate::property::DependencyProperty;
use crate::types::{Capability, CapabilitySet, TypeRef};
use crate::value::Value;
use parking_lot::Mutex;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use weft_sdk::{NativeEngine, NativeHandle};

/// Shared handle to a proxy
pub type Proxy = Arc<ProxyObject>;

/// How a proxy relates to its native object's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// The proxy holds one native reference and releases it on disposal
    Owning,
    /// The engine controls the lifetime; the proxy only watches
    Observing,
}

/// A native reference the proxy is responsible for releasing
pub(crate) struct OwnedHandle {
    handle: NativeHandle,
    engine: Arc<dyn NativeEngine>,
}

impl OwnedHandle {
    pub(crate) fn new(handle: NativeHandle, engine: Arc<dyn NativeEngine>) -> Self {
        Self { handle, engine }
    }

    /// Give up the reference without releasing it
    fn disarm(mut self) {
        self.handle = NativeHandle::NULL;
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            let remaining = self.engine.release(self.handle);
            tracing::trace!(handle = %self.handle, remaining, "released native reference");
        }
    }
}

/// A native object the proxy watches but does not own
pub(crate) struct ObservedHandle {
    handle: NativeHandle,
}

impl ObservedHandle {
    pub(crate) fn new(handle: NativeHandle) -> Self {
        Self { handle }
    }
}

/// The native side of a live proxy
pub(crate) enum HandleSlot {
    Owned(OwnedHandle),
    Observed(ObservedHandle),
}

impl HandleSlot {
    pub(crate) fn owned(handle: NativeHandle, engine: Arc<dyn NativeEngine>) -> Self {
        HandleSlot::Owned(OwnedHandle::new(handle, engine))
    }

    pub(crate) fn observed(handle: NativeHandle) -> Self {
        HandleSlot::Observed(ObservedHandle::new(handle))
    }

    fn handle(&self) -> NativeHandle {
        match self {
            HandleSlot::Owned(owned) => owned.handle,
            HandleSlot::Observed(observed) => observed.handle,
        }
    }

    fn ownership(&self) -> Ownership {
        match self {
            HandleSlot::Owned(_) => Ownership::Owning,
            HandleSlot::Observed(_) => Ownership::Observing,
        }
    }
}

/// Managed proxy for a native object
///
/// Equality and hashing follow the native handle, which becomes NULL on
/// disposal. A disposed proxy therefore compares equal to every other
/// disposed proxy and hashes differently than it did while live: a proxy
/// kept in a `HashSet` or used as a `HashMap` key can no longer be found
/// once it is disposed. Remove it from hashed collections before disposing
/// it, or key them by [`ProxyObject::handle`] captured while live.
pub struct ProxyObject {
    ty: TypeRef,
    ownership: Ownership,
    raw: AtomicUsize,
    slot: Mutex<Option<HandleSlot>>,
    bridge: Weak<BridgeInner>,
}

impl ProxyObject {
    pub(crate) fn new(ty: TypeRef, slot: HandleSlot, bridge: Weak<BridgeInner>) -> Self {
        Self {
            ty,
            ownership: slot.ownership(),
            raw: AtomicUsize::new(slot.handle().as_raw()),
            slot: Mutex::new(Some(slot)),
            bridge,
        }
    }

    /// A proxy with no native object.
    ///
    /// This is what construction yields when the engine cannot allocate an
    /// object. The proxy is born disposed.
    pub fn detached(ty: TypeRef) -> Proxy {
        Arc::new(Self {
            ty,
            ownership: Ownership::Owning,
            raw: AtomicUsize::new(0),
            slot: Mutex::new(None),
            bridge: Weak::new(),
        })
    }

    /// Native handle, or NULL once disposed
    pub fn handle(&self) -> NativeHandle {
        NativeHandle::from_raw(self.raw.load(Ordering::Acquire))
    }

    /// Check if the proxy no longer has a native object
    pub fn is_disposed(&self) -> bool {
        self.handle().is_null()
    }

    /// Owning or observing
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Managed type of the proxy
    pub fn type_ref(&self) -> &TypeRef {
        &self.ty
    }

    /// Capabilities of the proxy's type
    pub fn capabilities(&self) -> &CapabilitySet {
        self.ty.capabilities()
    }

    /// Check for a capability
    pub fn supports(&self, capability: &Capability) -> bool {
        self.ty.supports(capability)
    }

    /// The bridge that created this proxy, if it is still alive
    pub fn bridge(&self) -> Option<Bridge> {
        self.bridge.upgrade().map(Bridge::from_inner)
    }

    /// Read a dependency property through the owning bridge
    pub fn get_value(&self, property: &DependencyProperty) -> BridgeResult<Value> {
        let bridge = self.bridge.upgrade().ok_or(BridgeError::Detached)?;
        bridge.get_value(self, property)
    }

    /// Write a dependency property through the owning bridge
    pub fn set_value(
        &self,
        property: &DependencyProperty,
        value: impl Into<Value>,
    ) -> BridgeResult<()> {
        let bridge = self.bridge.upgrade().ok_or(BridgeError::Detached)?;
        bridge.set_value(self, property, value.into())
    }

    /// Detach from the native object.
    ///
    /// Removes the proxy's table entry, stops observing, and releases the
    /// owned reference, in that order. Later calls do nothing.
    pub fn dispose(&self) {
        let Some(slot) = self.slot.lock().take() else {
            return;
        };
        let handle = slot.handle();
        self.raw.store(0, Ordering::Release);
        if let Some(bridge) = self.bridge.upgrade() {
            bridge.forget_proxy(handle, self, self.ownership);
        }
        tracing::trace!(%handle, ty = %self.ty, ownership = ?self.ownership, "disposed proxy");
        drop(slot);
    }

    /// Forget the native object without releasing it.
    ///
    /// Used when the native object is already gone or the engine that owns
    /// it has been reinitialized. Returns false if already disposed.
    pub(crate) fn detach(&self) -> bool {
        let Some(slot) = self.slot.lock().take() else {
            return false;
        };
        self.raw.store(0, Ordering::Release);
        if let HandleSlot::Owned(owned) = slot {
            owned.disarm();
        }
        true
    }
}

impl Drop for ProxyObject {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl PartialEq for ProxyObject {
    fn eq(&self, other: &Self) -> bool {
        self.handle() == other.handle()
    }
}

impl Eq for ProxyObject {}

impl Hash for ProxyObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle().hash(state);
    }
}

impl fmt::Debug for ProxyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyObject")
            .field("type", &self.ty.name())
            .field("handle", &self.handle())
            .field("ownership", &self.ownership)
            .finish()
    }
}
