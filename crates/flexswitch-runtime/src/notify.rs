//! Swap-status notifications.
//!
//! Every configuration lifecycle event emits a [`SwapNotification`] through
//! the switch's [`NotificationTransport`]. The transport is
//! message-oriented; deliveries are in-order per device, with no ordering
//! guarantee across devices.

use serde::{Deserialize, Serialize};

/// Status carried by a swap notification. Values are wire-stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SwapStatus {
    /// A staged configuration was loaded and validated.
    NewConfigLoaded = 0,
    /// The control plane ordered a swap.
    SwapRequested = 1,
    /// The swap committed; the staged configuration is live.
    SwapCompleted = 2,
    /// A pending swap was discarded by `reset_state`.
    SwapCancelled = 3,
}

/// One swap-status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapNotification {
    /// Device the context belongs to.
    pub device_id: u64,
    /// Context the event happened in.
    pub context_id: u32,
    /// What happened.
    pub status: SwapStatus,
}

/// Errors from sending a notification.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No receiver is listening anymore.
    #[error("notification channel closed")]
    Closed,
}

/// Message transport for swap-status notifications.
pub trait NotificationTransport: Send + Sync {
    /// Sends one message. Failures are logged by the caller, never
    /// propagated into the swap protocol.
    ///
    /// # Errors
    ///
    /// `Closed` when the transport can no longer deliver.
    fn send(&self, notification: &SwapNotification) -> Result<(), TransportError>;
}

/// In-process transport over a crossbeam channel. The receiving half is
/// handed to whoever consumes notifications (tests, an RPC bridge).
pub struct ChannelTransport {
    tx: crossbeam_channel::Sender<SwapNotification>,
}

impl ChannelTransport {
    /// Creates the transport and its receiver.
    #[must_use]
    pub fn pair() -> (Self, crossbeam_channel::Receiver<SwapNotification>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (ChannelTransport { tx }, rx)
    }
}

impl NotificationTransport for ChannelTransport {
    fn send(&self, notification: &SwapNotification) -> Result<(), TransportError> {
        self.tx
            .send(*notification)
            .map_err(|_| TransportError::Closed)
    }
}

/// A transport that drops every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

impl NotificationTransport for NullTransport {
    fn send(&self, _notification: &SwapNotification) -> Result<(), TransportError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_transport_delivers_in_order() {
        let (transport, rx) = ChannelTransport::pair();
        for status in [SwapStatus::NewConfigLoaded, SwapStatus::SwapCompleted] {
            transport
                .send(&SwapNotification {
                    device_id: 3,
                    context_id: 0,
                    status,
                })
                .unwrap();
        }
        assert_eq!(rx.recv().unwrap().status, SwapStatus::NewConfigLoaded);
        assert_eq!(rx.recv().unwrap().status, SwapStatus::SwapCompleted);
    }

    #[test]
    fn closed_channel_reports_error() {
        let (transport, rx) = ChannelTransport::pair();
        drop(rx);
        assert!(transport
            .send(&SwapNotification {
                device_id: 0,
                context_id: 0,
                status: SwapStatus::SwapRequested,
            })
            .is_err());
    }

    #[test]
    fn notification_serializes_with_stable_fields() {
        let note = SwapNotification {
            device_id: 7,
            context_id: 2,
            status: SwapStatus::SwapCancelled,
        };
        let json = serde_json::to_string(&note).unwrap();
        let back: SwapNotification = serde_json::from_str(&json).unwrap();
        assert_eq!(back, note);
    }
}
