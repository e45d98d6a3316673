use embassy_time::Duration;

/// The maximum number of network profiles, that can be stored at once.
pub const WLAN_MAX_KNOWN_NETWORKS: usize = 5;
/// The maximum number of BSSs kept from a single scan.
pub const MAX_SCAN_RESULTS: usize = 16;
/// Minimum length of a network profile name.
pub const WLAN_NETWORK_NAME_MIN_LENGTH: usize = 1;
/// Maximum length of a network profile name.
pub const WLAN_NETWORK_NAME_MAX_LENGTH: usize = 32;

cfg_if::cfg_if! {
    if #[cfg(feature = "wifi-direct")] {
        /// How many times the target network is scanned for, before giving up.
        ///
        /// Wi-Fi Direct takes turns with the station on the radio, so more rounds are needed.
        pub const WLAN_RESCAN_LIMIT: u8 = 10;
    } else {
        /// How many times the target network is scanned for, before giving up.
        pub const WLAN_RESCAN_LIMIT: u8 = 5;
    }
}

/// Runtime configuration of the connection manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WlanConfig {
    /// Scan rounds per connection attempt, before `NetworkNotFound` is reported.
    ///
    /// A value of zero is treated as one.
    pub rescan_limit: u8,
    /// Upper bound for association and authentication with the chosen BSS.
    pub association_timeout: Duration,
    /// Upper bound for obtaining an address, after association succeeded.
    pub address_timeout: Duration,
    /// The channel used by the micro-AP, if neither the profile nor a connected station pins one.
    pub uap_default_channel: u8,
    /// Only accept station profiles using WPA2-Enterprise.
    pub wpa2_enterprise_only: bool,
}
impl Default for WlanConfig {
    fn default() -> Self {
        Self {
            rescan_limit: WLAN_RESCAN_LIMIT,
            association_timeout: Duration::from_secs(10),
            address_timeout: Duration::from_secs(30),
            uap_default_channel: 6,
            wpa2_enterprise_only: false,
        }
    }
}
impl WlanConfig {
    /// The effective number of scan rounds.
    pub const fn scan_rounds(&self) -> u8 {
        if self.rescan_limit == 0 {
            1
        } else {
            self.rescan_limit
        }
    }
}
