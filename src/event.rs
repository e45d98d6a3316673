use embassy_sync::{blocking_mutex::raw::RawMutex, channel::Channel};

use crate::{power::PowerSaveKind, profile::MacAddress};

/// Asynchronous notifications from the connection manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WlanEvent {
    /// The station is connected and has an address.
    Success,
    /// The connection attempt failed for an unspecified reason.
    ConnectFailed,
    /// The network wasn't found after all scan rounds.
    NetworkNotFound,
    /// Authentication with the network failed.
    NetworkAuthFailed,
    /// A DHCP lease was renewed.
    AddressSuccess,
    /// No address could be obtained or the lease was lost.
    AddressFailed,
    /// The connection to the network was lost.
    LinkLost,
    /// The network moved to another channel.
    ChanSwitch(u8),
    /// The radio ended a WPS session.
    WpsDisconnect,
    /// The station was disconnected on request.
    UserDisconnect,
    Initialized,
    InitializationFailed,
    PsEnter(PowerSaveKind),
    PsExit(PowerSaveKind),
    UapSuccess,
    UapClientAssoc(MacAddress),
    UapClientDissoc(MacAddress),
    UapStartFailed,
    UapStopFailed,
    UapStopped,
}
impl WlanEvent {
    /// Check if this event concludes a connection attempt.
    pub const fn is_connect_outcome(&self) -> bool {
        matches!(
            self,
            Self::Success
                | Self::ConnectFailed
                | Self::NetworkNotFound
                | Self::NetworkAuthFailed
                | Self::AddressFailed
        )
    }
}

/// Receives the events of the connection manager.
///
/// The sink is called from the worker, so it must not block for long.
pub trait EventSink {
    fn on_event(&mut self, event: WlanEvent);
}
impl<F: FnMut(WlanEvent)> EventSink for F {
    fn on_event(&mut self, event: WlanEvent) {
        self(event)
    }
}
impl<M: RawMutex, const N: usize> EventSink for &Channel<M, WlanEvent, N> {
    fn on_event(&mut self, event: WlanEvent) {
        if self.try_send(event).is_err() {
            error!("Event queue full, dropping event.");
        }
    }
}

#[cfg(test)]
mod tests {
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    use super::*;

    #[test]
    fn channel_sink_drops_on_overflow() {
        let channel = Channel::<NoopRawMutex, WlanEvent, 2>::new();
        let mut sink = &channel;
        sink.on_event(WlanEvent::Initialized);
        sink.on_event(WlanEvent::Success);
        sink.on_event(WlanEvent::LinkLost);
        assert_eq!(channel.try_receive().ok(), Some(WlanEvent::Initialized));
        assert_eq!(channel.try_receive().ok(), Some(WlanEvent::Success));
        assert!(channel.try_receive().is_err());
    }
}
