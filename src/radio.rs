//! The seam between the connection manager and the Wi-Fi driver.
//!
//! The manager never touches hardware itself. It drives an implementation of [Radio], which is
//! owned by the worker, and receives unsolicited notifications as [RadioEvent]s through
//! [WlanManager::radio_events](crate::WlanManager::radio_events).
//!
//! ## Cancellation
//! The futures returned by [Radio::scan], [Radio::associate] and [Radio::configure_address] may
//! be dropped before they complete, either because a newer station request preempted the
//! connection attempt or because a timeout expired. After that, [Radio::deauthenticate] is
//! called, which must bring the station back into a clean state.
use crate::{
    power::{IeeePsConfig, UapPsConfig},
    profile::{InterfaceAddress, IpConfig, MacAddress, NetworkProfile},
    scan::{ScanParams, ScanResult, ScanResultSet},
};

/// Errors reported by the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioError {
    /// The radio is busy with another operation.
    Busy,
    NoMemory,
    Timeout,
    NotSupported,
    /// The firmware reported a failure.
    Failed,
}

/// Reasons why an association failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AssociationError {
    /// The key was wrong or the 4-way handshake timed out.
    AuthenticationFailed,
    /// The AP refused the association.
    Rejected,
    /// The AP couldn't be reached anymore.
    NotFound,
    Driver(RadioError),
}

/// The firmware and calibration data loaded during initialization.
#[derive(Clone, Copy, Debug, Default)]
pub struct FirmwareDescriptor<'a> {
    pub image: &'a [u8],
    pub calibration: Option<&'a [u8]>,
    /// Overrides the MAC address reported by the radio.
    pub mac_address: Option<MacAddress>,
}

/// What to do with the radio, when the manager is torn down.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeinitAction {
    /// Keep the radio powered.
    #[default]
    KeepPowered,
    /// Power the radio down.
    PowerDown,
}

/// Signal quality of the current connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SignalStrength {
    /// In dBm.
    pub rssi: i16,
    /// Noise floor in dBm.
    pub noise_floor: i16,
    /// In dB.
    pub snr: i16,
}

/// A change of the power save configuration of the radio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PowerSaveRequest {
    EnterIeee(IeeePsConfig),
    ExitIeee,
    EnterDeepSleep,
    ExitDeepSleep,
    PowerDown,
    PowerUp,
    EnterUap(UapPsConfig),
    ExitUap,
}

/// Unsolicited notifications from the driver.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RadioEvent {
    /// The connection to the AP was lost.
    LinkLost,
    /// The AP moved to another channel.
    ChannelSwitch(u8),
    /// The DHCP lease was renewed.
    LeaseRenewed(InterfaceAddress),
    /// The DHCP lease couldn't be renewed.
    LeaseLost,
    UapClientAssociated(MacAddress),
    UapClientDissociated(MacAddress),
    /// A WPS session ended and took the station with it.
    WpsSessionEnded,
}

/// A Wi-Fi driver.
#[allow(async_fn_in_trait)]
pub trait Radio {
    /// Load the firmware and bring the chip up.
    ///
    /// Returns the MAC address of the chip.
    async fn init(&mut self, firmware: &FirmwareDescriptor<'_>) -> Result<MacAddress, RadioError>;
    async fn deinit(&mut self, action: DeinitAction);
    /// Called by the worker, before it processes any requests.
    async fn start(&mut self) -> Result<(), RadioError>;
    /// Called by the worker, before it returns.
    async fn stop(&mut self);
    /// Scan for networks and push the results into `results`.
    ///
    /// Results, that don't fit into `results`, are dropped.
    async fn scan(
        &mut self,
        params: &ScanParams,
        results: &mut ScanResultSet,
    ) -> Result<(), RadioError>;
    /// Authenticate and associate with a BSS.
    ///
    /// `network` is fully resolved, so it names the SSID, BSSID, channel and security used.
    async fn associate(
        &mut self,
        bss: &ScanResult,
        network: &NetworkProfile,
    ) -> Result<(), AssociationError>;
    /// Leave the current BSS. This must succeed even if no association exists.
    async fn deauthenticate(&mut self);
    /// Configure the address of the station, running DHCP if requested.
    async fn configure_address(&mut self, ip: &IpConfig) -> Result<InterfaceAddress, RadioError>;
    async fn start_uap(&mut self, network: &NetworkProfile, channel: u8)
        -> Result<(), RadioError>;
    async fn stop_uap(&mut self) -> Result<(), RadioError>;
    async fn set_power_save(&mut self, request: PowerSaveRequest) -> Result<(), RadioError>;
    async fn signal_strength(&mut self) -> Result<SignalStrength, RadioError>;
}
