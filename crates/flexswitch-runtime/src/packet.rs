//! Packets as inflight leases.
//!
//! A [`Packet`] owns the read side of the switch's packet-inflight barrier
//! for its whole lifetime. A full config swap takes the write side, so
//! constructing the swap barrier blocks until every packet has been
//! destroyed and no new one can be constructed until the swap releases it.

use std::fmt;
use std::sync::Arc;

use parking_lot::lock_api::ArcRwLockReadGuard;
use parking_lot::{RawRwLock, RwLock};

use crate::context::ContextId;

/// The barrier type shared between the switch and its packets.
pub(crate) type InflightBarrier = Arc<RwLock<()>>;

/// A packet instance tied to one context, holding its inflight lease.
pub struct Packet {
    context_id: ContextId,
    ingress_port: u32,
    id: u64,
    data: Vec<u8>,
    _inflight: ArcRwLockReadGuard<RawRwLock, ()>,
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("context_id", &self.context_id)
            .field("ingress_port", &self.ingress_port)
            .field("id", &self.id)
            .field("len", &self.data.len())
            .finish_non_exhaustive()
    }
}

impl Packet {
    pub(crate) fn new(
        barrier: &InflightBarrier,
        context_id: ContextId,
        ingress_port: u32,
        id: u64,
        data: Vec<u8>,
    ) -> Self {
        let inflight = RwLock::read_arc(barrier);
        Packet {
            context_id,
            ingress_port,
            id,
            data,
            _inflight: inflight,
        }
    }

    /// Context the packet entered through.
    #[must_use]
    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    /// Ingress port.
    #[must_use]
    pub fn ingress_port(&self) -> u32 {
        self.ingress_port
    }

    /// Packet id assigned by the receiver.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Packet bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Packet bytes, mutably.
    pub fn data_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }
}
