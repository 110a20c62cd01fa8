//! Per-connection security context store.
//!
//! A context holds the key material negotiated for one connection. It is
//! created when the host replies to a security parameters request, filled
//! in when pairing completes, and released when the connection ends.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gaprpc_codec::{EventRecord, GapEvent, SecKeys, SecKeyset};
use tracing::{debug, warn};

use crate::error::{Result, RpcError};

/// Snapshot of one connection's security context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityContext {
    pub conn_handle: u16,
    pub keyset: SecKeyset,
}

/// Security contexts keyed by connection handle.
#[derive(Debug, Default)]
pub struct SecurityContextStore {
    contexts: Mutex<HashMap<u16, SecKeyset>>,
}

impl SecurityContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u16, SecKeyset>> {
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create the context for `conn_handle`.
    ///
    /// Fails with `SecurityContextConflict` if one already exists; the
    /// existing context is left untouched.
    pub fn create(&self, conn_handle: u16, keyset: Option<SecKeyset>) -> Result<()> {
        let mut contexts = self.lock();
        if contexts.contains_key(&conn_handle) {
            return Err(RpcError::SecurityContextConflict(conn_handle));
        }
        contexts.insert(conn_handle, keyset.unwrap_or_default());
        debug!(conn_handle, "security context created");
        Ok(())
    }

    pub fn lookup(&self, conn_handle: u16) -> Option<SecurityContext> {
        self.lock().get(&conn_handle).map(|keyset| SecurityContext {
            conn_handle,
            keyset: *keyset,
        })
    }

    pub fn contains(&self, conn_handle: u16) -> bool {
        self.lock().contains_key(&conn_handle)
    }

    /// Merge `keyset` into the existing context.
    pub fn update(&self, conn_handle: u16, keyset: &SecKeyset) -> Result<()> {
        let mut contexts = self.lock();
        let slot = contexts
            .get_mut(&conn_handle)
            .ok_or(RpcError::SecurityContextNotFound(conn_handle))?;
        slot.merge(keyset);
        Ok(())
    }

    /// Store keys distributed during pairing.
    pub fn apply_keys(&self, conn_handle: u16, own: &SecKeys, peer: &SecKeys) -> Result<()> {
        self.update(
            conn_handle,
            &SecKeyset {
                own: *own,
                peer: *peer,
            },
        )
    }

    /// Remove the context. Returns whether one existed.
    pub fn release(&self, conn_handle: u16) -> bool {
        let existed = self.lock().remove(&conn_handle).is_some();
        if existed {
            debug!(conn_handle, "security context released");
        }
        existed
    }

    /// Apply what an incoming event means for stored contexts: keys from a
    /// completed pairing are stored, and a disconnect drops the context.
    ///
    /// Runs on the reader for every such event, whether or not the event
    /// later reaches subscribers.
    pub(crate) fn observe(&self, record: &EventRecord) {
        let conn_handle = record.conn_handle;
        match &record.event {
            GapEvent::AuthStatus(status) => {
                if !self.contains(conn_handle) {
                    return;
                }
                match self.apply_keys(conn_handle, &status.own_keys, &status.peer_keys) {
                    Ok(()) => debug!(
                        conn_handle,
                        auth_status = status.auth_status,
                        "stored distributed keys"
                    ),
                    Err(err) => warn!(conn_handle, error = %err, "could not store distributed keys"),
                }
            }
            GapEvent::Disconnected(_) => {
                self.release(conn_handle);
            }
            _ => {}
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Handles with a live context, ascending.
    pub fn handles(&self) -> Vec<u16> {
        let mut handles: Vec<u16> = self.lock().keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    /// Create a context that is released again unless committed.
    pub fn lease(self: &Arc<Self>, conn_handle: u16, keyset: Option<SecKeyset>) -> Result<ContextLease> {
        self.create(conn_handle, keyset)?;
        Ok(ContextLease {
            store: Arc::clone(self),
            conn_handle,
            committed: false,
        })
    }
}

/// A freshly created context, held while the call that needs it is in
/// flight.
///
/// Dropped without [`commit`](ContextLease::commit), the context is
/// released.
#[derive(Debug)]
#[must_use = "an uncommitted lease releases its context when dropped"]
pub struct ContextLease {
    store: Arc<SecurityContextStore>,
    conn_handle: u16,
    committed: bool,
}

impl ContextLease {
    pub fn conn_handle(&self) -> u16 {
        self.conn_handle
    }

    /// Keep the context in the store past this lease.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for ContextLease {
    fn drop(&mut self) {
        if !self.committed {
            self.store.release(self.conn_handle);
        }
    }
}
