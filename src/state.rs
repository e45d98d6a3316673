/// Lifecycle of the connection manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ManagerStatus {
    /// The radio hasn't been initialized.
    Inactive,
    /// The radio is initialized, but the worker isn't running.
    Initialized,
    /// The worker is running and requests are accepted.
    Running,
}

/// Connection state of the station interface.
///
/// A connection attempt moves through the states in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    Disconnected,
    /// Looking for the target network.
    Scanning,
    /// Authenticating and associating with the chosen BSS.
    Associating,
    /// Associated, but no address yet.
    Associated,
    /// Waiting for an address.
    ObtainingAddress,
    Connected,
}
impl ConnectionState {
    /// Check if a connection attempt is in progress.
    pub const fn is_connecting(&self) -> bool {
        matches!(
            self,
            Self::Scanning | Self::Associating | Self::Associated | Self::ObtainingAddress
        )
    }
    /// Check if the station is associated with a BSS.
    pub const fn is_associated(&self) -> bool {
        matches!(
            self,
            Self::Associated | Self::ObtainingAddress | Self::Connected
        )
    }
}

/// State of the micro-AP interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UapConnectionState {
    Stopped,
    Started,
}

/// Counters kept over the lifetime of the manager.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionStats {
    pub connection_attempts: u32,
    pub connection_successes: u32,
    pub connection_failures: u32,
    pub auth_failures: u32,
    pub network_not_found: u32,
    pub link_losses: u32,
    pub dhcp_successes: u32,
    pub dhcp_failures: u32,
    pub lease_renewals: u32,
    pub lease_failures: u32,
}
impl ConnectionStats {
    pub const fn new() -> Self {
        Self {
            connection_attempts: 0,
            connection_successes: 0,
            connection_failures: 0,
            auth_failures: 0,
            network_not_found: 0,
            link_losses: 0,
            dhcp_successes: 0,
            dhcp_failures: 0,
            lease_renewals: 0,
            lease_failures: 0,
        }
    }
}
