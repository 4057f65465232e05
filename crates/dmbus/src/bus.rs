// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dmbus contributors

//! Bus entry point and the process-wide component registry.
//!
//! A [`Bus`] owns the transport, the shared configuration, and the
//! registry of open handles. Admission is bounded: a fixed number of
//! component slots plus a larger handle list, both checked at open.
//! Opening a name that is already open replaces the prior handle
//! (closing it fully first) rather than failing. The last handle to
//! close also closes the shared transport connection.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::handle::{Handle, HandleEndpoint, HandleInner};
use crate::transport::{LocalTransport, Transport};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// Simultaneous named components one bus admits.
pub const MAX_COMPONENTS: usize = 5;

/// Upper bound on tracked handles. Sized above [`MAX_COMPONENTS`] to
/// leave room for connection kinds that do not occupy a component slot.
pub const MAX_HANDLES: usize = 16;

#[derive(Default)]
struct BusRegistry {
    slots: [Option<String>; MAX_COMPONENTS],
    handles: Vec<Arc<HandleInner>>,
}

impl BusRegistry {
    fn find_by_name(&self, name: &str) -> Option<Arc<HandleInner>> {
        self.handles
            .iter()
            .find(|h| h.component_name() == name)
            .cloned()
    }

    fn find_by_id(&self, component_id: i32) -> Option<Arc<HandleInner>> {
        self.handles
            .iter()
            .find(|h| h.component_id() == component_id)
            .cloned()
    }

    fn ensure_capacity(&self) -> Result<()> {
        if self.handles.len() >= MAX_HANDLES {
            return Err(Error::OutOfResources);
        }
        if !self.slots.iter().any(Option::is_none) {
            return Err(Error::OutOfResources);
        }
        Ok(())
    }

    fn admit(&mut self, inner: &Arc<HandleInner>) -> Result<()> {
        self.ensure_capacity()?;
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.is_none())
            .ok_or(Error::OutOfResources)?;
        *slot = Some(inner.component_name().to_string());
        self.handles.push(Arc::clone(inner));
        Ok(())
    }

    /// Remove a handle; true when it was the last one out.
    fn release(&mut self, inner: &Arc<HandleInner>) -> bool {
        self.handles.retain(|h| !Arc::ptr_eq(h, inner));
        if let Some(slot) = self
            .slots
            .iter_mut()
            .find(|s| s.as_deref() == Some(inner.component_name()))
        {
            *slot = None;
        }
        self.handles.is_empty()
    }
}

pub(crate) struct BusCore {
    transport: Arc<dyn Transport>,
    config: Arc<ArcSwap<Config>>,
    registry: Mutex<BusRegistry>,
    next_component_id: AtomicI32,
}

impl BusCore {
    /// Called from handle teardown; true means the caller was the last
    /// handle and owes the transport shutdown.
    pub(crate) fn release(&self, inner: &Arc<HandleInner>) -> bool {
        self.registry.lock().release(inner)
    }
}

/// The bus library object. Cheap to clone; all clones share one
/// transport, one configuration, and one component registry.
#[derive(Clone)]
pub struct Bus {
    core: Arc<BusCore>,
}

impl Bus {
    /// A bus over the in-process transport, configured from the
    /// environment. The common starting point for tests and single
    /// process deployments.
    #[must_use]
    pub fn local() -> Self {
        Self::with_transport(LocalTransport::new(), Config::from_env())
    }

    pub fn with_transport(transport: Arc<dyn Transport>, config: Config) -> Self {
        Self {
            core: Arc::new(BusCore {
                transport,
                config: Arc::new(ArcSwap::from_pointee(config)),
                registry: Mutex::new(BusRegistry::default()),
                next_component_id: AtomicI32::new(1),
            }),
        }
    }

    /// Open a connection for a named component.
    ///
    /// If the name is already open the prior handle is closed first,
    /// registrations and subscriptions included; the replacement starts
    /// empty. Fails with `OutOfResources` once the component slots or
    /// the handle list are full.
    pub fn open(&self, component_name: &str) -> Result<Handle> {
        if component_name.is_empty() {
            return Err(Error::InvalidInput);
        }

        // Replacement close runs outside the registry lock; it re-enters
        // through BusCore::release.
        let prior = self.core.registry.lock().find_by_name(component_name);
        if let Some(prior) = prior {
            log::info!("[bus] {component_name} already open, replacing the prior handle");
            if let Err(e) = Handle::from_inner(prior).close() {
                log::warn!("[bus] implicit close of {component_name} failed: {e}");
            }
        }

        let mut registry = self.core.registry.lock();
        registry.ensure_capacity().map_err(|e| {
            log::error!("[bus] component limit reached, {component_name} not admitted");
            e
        })?;

        self.core.transport.open_connection(component_name)?;

        let component_id = self.core.next_component_id.fetch_add(1, Ordering::SeqCst);
        let inner = Arc::new(HandleInner::new(
            component_name.to_string(),
            component_id,
            Arc::clone(&self.core.transport),
            Arc::clone(&self.core.config),
            Arc::downgrade(&self.core),
        ));

        let endpoint = HandleEndpoint::new(&inner);
        if let Err(e) = self
            .core
            .transport
            .register_component(component_name, endpoint)
        {
            log::error!("[bus] could not register {component_name}: {e}");
            // no other handle shares the connection yet, give it back
            if registry.handles.is_empty() {
                if let Err(undo) = self.core.transport.close_connection() {
                    log::debug!("[bus] connection close after failed register: {undo}");
                }
            }
            return Err(Error::Bus);
        }

        if let Err(e) = registry.admit(&inner) {
            if let Err(undo) = self.core.transport.unregister_component(component_name) {
                log::debug!("[bus] undo register of {component_name} failed: {undo}");
            }
            return Err(e);
        }
        log::info!("[bus] {component_name} open, component id {component_id}");
        Ok(Handle::from_inner(inner))
    }

    /// Snapshot of the active configuration.
    #[must_use]
    pub fn config(&self) -> Arc<Config> {
        self.core.config.load_full()
    }

    /// Swap the configuration; open handles pick it up on their next
    /// read, no quiescing needed.
    pub fn update_config(&self, config: Config) {
        self.core.config.store(Arc::new(config));
    }

    #[must_use]
    pub fn open_count(&self) -> usize {
        self.core.registry.lock().handles.len()
    }

    /// Look up an open component by name.
    #[must_use]
    pub fn find_component(&self, name: &str) -> Option<Handle> {
        self.core
            .registry
            .lock()
            .find_by_name(name)
            .map(Handle::from_inner)
    }

    /// Look up an open component by the id assigned at open.
    #[must_use]
    pub fn find_component_by_id(&self, component_id: i32) -> Option<Handle> {
        self.core
            .registry
            .lock()
            .find_by_id(component_id)
            .map(Handle::from_inner)
    }
}
