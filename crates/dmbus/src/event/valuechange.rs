// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dmbus contributors

//! Polling change detection for subscribed properties.
//!
//! Providers rarely push property changes themselves; instead, when a
//! subscription with auto-publish lands on a property, the bus samples the
//! get handler on a timer and publishes a `ValueChanged` event whenever the
//! result differs structurally from the cached one. The poll thread starts
//! lazily with the first watched property and exits with the last.

use crate::element::{GetHandler, GetHandlerOptions, NodeId};
use crate::handle::Handle;
use crate::value::Value;
use crossbeam::channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;

struct VcEntry {
    node: NodeId,
    full_name: String,
    get: GetHandler,
    /// Last sampled value; stays `None` until a sample succeeds, and the
    /// first success after that becomes the baseline without an event.
    last: Option<Value>,
}

struct Worker {
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

impl Worker {
    fn stop(self) {
        let _ = self.stop.send(());
        if self.thread.join().is_err() {
            log::warn!("[valuechange] poll thread panicked");
        }
    }
}

#[derive(Default)]
struct VcState {
    entries: Vec<VcEntry>,
    worker: Option<Worker>,
}

/// Per-handle change detector. All methods are callable from any thread;
/// none may be invoked while the caller holds the handle state lock, since
/// the poll thread takes that lock when publishing.
#[derive(Default)]
pub struct ValueChangeDetector {
    state: Arc<Mutex<VcState>>,
}

impl ValueChangeDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start watching a property node. The get handler is sampled once to
    /// seed the baseline; a failed seed is tolerated and the next good
    /// sample becomes the baseline silently.
    pub fn watch(&self, handle: &Handle, node: NodeId, full_name: &str, get: GetHandler) {
        if self.watching(node) {
            return;
        }
        let opts = GetHandlerOptions {
            requesting_component: handle.component_name().to_string(),
        };
        let last = match get(handle, full_name, &opts) {
            Ok(value) => Some(value),
            Err(e) => {
                log::debug!("[valuechange] initial sample of {full_name} failed: {e}");
                None
            }
        };

        let mut state = self.state.lock();
        if state.entries.iter().any(|e| e.node == node) {
            return;
        }
        log::debug!("[valuechange] watching {full_name}");
        state.entries.push(VcEntry {
            node,
            full_name: full_name.to_string(),
            get,
            last,
        });
        if state.worker.is_none() {
            state.worker = self.spawn_worker(handle);
        }
    }

    /// Stop watching a node; the poll thread winds down with the last entry.
    pub fn unwatch(&self, node: NodeId) {
        self.unwatch_many(&[node]);
    }

    pub fn unwatch_many(&self, nodes: &[NodeId]) {
        let worker = {
            let mut state = self.state.lock();
            let before = state.entries.len();
            state.entries.retain(|e| !nodes.contains(&e.node));
            if state.entries.len() != before {
                log::debug!(
                    "[valuechange] {} properties still watched",
                    state.entries.len()
                );
            }
            if state.entries.is_empty() {
                state.worker.take()
            } else {
                None
            }
        };
        if let Some(worker) = worker {
            worker.stop();
        }
    }

    #[must_use]
    pub fn watching(&self, node: NodeId) -> bool {
        self.state.lock().entries.iter().any(|e| e.node == node)
    }

    /// Drop all entries and stop the poll thread. Called on handle close.
    pub fn close(&self) {
        let worker = {
            let mut state = self.state.lock();
            state.entries.clear();
            state.worker.take()
        };
        if let Some(worker) = worker {
            worker.stop();
        }
    }

    fn spawn_worker(&self, handle: &Handle) -> Option<Worker> {
        let (stop, rx) = bounded::<()>(1);
        let weak = handle.downgrade();
        let state = Arc::clone(&self.state);
        let period = handle.value_change_period();
        let thread = std::thread::Builder::new()
            .name("dmbus-valuechange".into())
            .spawn(move || loop {
                match rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => {
                        let Some(handle) = weak.upgrade() else { break };
                        tick(&handle, &state);
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            });
        match thread {
            Ok(thread) => Some(Worker { stop, thread }),
            Err(e) => {
                log::error!("[valuechange] failed to start poll thread: {e}");
                None
            }
        }
    }
}

fn tick(handle: &Handle, state: &Arc<Mutex<VcState>>) {
    let snapshot: Vec<(NodeId, String, GetHandler, Option<Value>)> = {
        let state = state.lock();
        state
            .entries
            .iter()
            .map(|e| (e.node, e.full_name.clone(), e.get.clone(), e.last.clone()))
            .collect()
    };
    let opts = GetHandlerOptions {
        requesting_component: handle.component_name().to_string(),
    };
    for (node, full_name, get, last) in snapshot {
        // handlers run outside both the detector and handle state locks
        match get(handle, &full_name, &opts) {
            Ok(new_value) => {
                let still_watched = {
                    let mut state = state.lock();
                    match state.entries.iter_mut().find(|e| e.node == node) {
                        Some(entry) => {
                            entry.last = Some(new_value.clone());
                            true
                        }
                        None => false,
                    }
                };
                if !still_watched {
                    continue;
                }
                match last {
                    Some(old_value) if old_value != new_value => {
                        handle.publish_value_change(&full_name, new_value, old_value);
                    }
                    _ => {}
                }
            }
            Err(e) => {
                // keep the cached baseline; a transient failure must not
                // fire a spurious change on recovery
                log::debug!("[valuechange] sampling {full_name} failed: {e}");
            }
        }
    }
}
