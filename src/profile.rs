//! Network profiles.
//!
//! A profile describes one network, either one to join as a station or one to host as a micro-AP.
//! The types in here are built so that a profile, which names neither an SSID nor a BSSID, or
//! which carries malformed key material, can't be constructed in the first place.
use core::{
    fmt,
    net::{Ipv4Addr, Ipv6Addr},
};

use crate::{config::WLAN_NETWORK_NAME_MAX_LENGTH, WlanError, WlanResult};

/// Maximum length of an SSID in bytes.
pub const SSID_MAX_LENGTH: usize = 32;
/// Maximum length of a WPA/WPA2 passphrase, including the 64 digit hex PSK form.
pub const WLAN_PSK_MAX_LENGTH: usize = 64;
/// Maximum length of a WPA3-SAE password.
pub const WLAN_PASSWORD_MAX_LENGTH: usize = 64;
/// Maximum length of an EAP identity.
pub const WLAN_IDENTITY_MAX_LENGTH: usize = 64;
/// Maximum number of IPv6 addresses tracked per interface.
pub const MAX_IPV6_ADDRESSES: usize = 3;

/// The unique name of a network profile.
pub type NetworkName = heapless::String<WLAN_NETWORK_NAME_MAX_LENGTH>;

/// A 48-bit IEEE MAC address.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MacAddress(pub [u8; 6]);
impl MacAddress {
    /// The all zero address, which is treated as "any".
    pub const ZERO: Self = Self([0x00; 6]);
    pub const fn new(address: [u8; 6]) -> Self {
        Self(address)
    }
    pub const fn is_zero(&self) -> bool {
        let mut i = 0;
        while i < self.0.len() {
            if self.0[i] != 0 {
                return false;
            }
            i += 1;
        }
        true
    }
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}
impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// An SSID of up to 32 bytes.
///
/// SSIDs are byte strings, they aren't required to be valid UTF-8.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Ssid {
    bytes: heapless::Vec<u8, SSID_MAX_LENGTH>,
}
impl Ssid {
    /// Create an SSID from a string.
    pub fn new(ssid: &str) -> WlanResult<Self> {
        Self::from_bytes(ssid.as_bytes())
    }
    /// Create an SSID from raw bytes, as found in a beacon.
    pub fn from_bytes(ssid: &[u8]) -> WlanResult<Self> {
        heapless::Vec::from_slice(ssid)
            .map(|bytes| Self { bytes })
            .map_err(|_| WlanError::InvalidArgument)
    }
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
    /// The SSID as a string, if it's valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.bytes).ok()
    }
    pub fn len(&self) -> usize {
        self.bytes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
impl fmt::Debug for Ssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(ssid) => write!(f, "{ssid:?}"),
            None => write!(f, "{:x?}", self.as_bytes()),
        }
    }
}

fn is_hex(value: &str) -> bool {
    value.bytes().all(|byte| byte.is_ascii_hexdigit())
}

/// A WPA/WPA2 pre-shared key.
///
/// Either a passphrase of 8 to 63 printable ASCII characters or a raw PSK of 64 hex digits.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Passphrase(heapless::String<WLAN_PSK_MAX_LENGTH>);
impl Passphrase {
    pub fn new(passphrase: &str) -> WlanResult<Self> {
        let valid = match passphrase.len() {
            8..=63 => passphrase.bytes().all(|byte| (0x20..=0x7e).contains(&byte)),
            64 => is_hex(passphrase),
            _ => false,
        };
        if !valid {
            return Err(WlanError::InvalidArgument);
        }
        heapless::String::try_from(passphrase)
            .map(Self)
            .map_err(|_| WlanError::InvalidArgument)
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    /// Check if this is a raw hex PSK rather than a passphrase.
    pub fn is_raw_psk(&self) -> bool {
        self.0.len() == 64
    }
}
impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(..)")
    }
}

/// A static WEP key, either 5/13 ASCII characters or 10/26 hex digits.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct WepKey(heapless::String<26>);
impl WepKey {
    pub fn new(key: &str) -> WlanResult<Self> {
        let valid = match key.len() {
            5 | 13 => key.is_ascii(),
            10 | 26 => is_hex(key),
            _ => false,
        };
        if !valid {
            return Err(WlanError::InvalidArgument);
        }
        heapless::String::try_from(key)
            .map(Self)
            .map_err(|_| WlanError::InvalidArgument)
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl fmt::Debug for WepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WepKey(..)")
    }
}

/// A WPA3-SAE password.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SaePassword(heapless::String<WLAN_PASSWORD_MAX_LENGTH>);
impl SaePassword {
    pub fn new(password: &str) -> WlanResult<Self> {
        if password.is_empty() {
            return Err(WlanError::InvalidArgument);
        }
        heapless::String::try_from(password)
            .map(Self)
            .map_err(|_| WlanError::InvalidArgument)
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl fmt::Debug for SaePassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SaePassword(..)")
    }
}

/// The EAP identity used for WPA2-Enterprise. The handshake itself is run by the radio.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EnterpriseIdentity(heapless::String<WLAN_IDENTITY_MAX_LENGTH>);
impl EnterpriseIdentity {
    pub fn new(identity: &str) -> WlanResult<Self> {
        if identity.is_empty() {
            return Err(WlanError::InvalidArgument);
        }
        heapless::String::try_from(identity)
            .map(Self)
            .map_err(|_| WlanError::InvalidArgument)
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The security configuration of a network, including the key material.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Security {
    /// An open network.
    None,
    WepOpen(WepKey),
    WepShared(WepKey),
    Wpa(Passphrase),
    Wpa2(Passphrase),
    /// Accept either WPA or WPA2.
    WpaWpa2Mixed(Passphrase),
    Wpa3Sae(SaePassword),
    /// Opportunistic Wireless Encryption.
    OweOnly,
    Wpa2Enterprise(EnterpriseIdentity),
    /// Accept whatever the network offers and adopt the strongest scheme it advertises.
    ///
    /// Without a passphrase, only open and OWE networks can be joined.
    Wildcard(Option<Passphrase>),
}
impl Security {
    /// The kind of security, without the key material.
    pub const fn kind(&self) -> SecurityKind {
        match self {
            Self::None => SecurityKind::None,
            Self::WepOpen(_) => SecurityKind::WepOpen,
            Self::WepShared(_) => SecurityKind::WepShared,
            Self::Wpa(_) => SecurityKind::Wpa,
            Self::Wpa2(_) => SecurityKind::Wpa2,
            Self::WpaWpa2Mixed(_) => SecurityKind::WpaWpa2Mixed,
            Self::Wpa3Sae(_) => SecurityKind::Wpa3Sae,
            Self::OweOnly => SecurityKind::OweOnly,
            Self::Wpa2Enterprise(_) => SecurityKind::Wpa2Enterprise,
            Self::Wildcard(_) => SecurityKind::Wildcard,
        }
    }
    /// Check if a key or password is configured.
    pub fn has_key(&self) -> bool {
        match self {
            Self::None | Self::OweOnly | Self::Wpa2Enterprise(_) | Self::Wildcard(None) => false,
            Self::WepOpen(_)
            | Self::WepShared(_)
            | Self::Wpa(_)
            | Self::Wpa2(_)
            | Self::WpaWpa2Mixed(_)
            | Self::Wpa3Sae(_)
            | Self::Wildcard(Some(_)) => true,
        }
    }
}

/// The kind of security used by a network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SecurityKind {
    None,
    WepOpen,
    WepShared,
    Wpa,
    Wpa2,
    WpaWpa2Mixed,
    Wpa3Sae,
    OweOnly,
    Wpa2Enterprise,
    Wildcard,
}

/// How a network is identified on air.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NetworkTarget {
    Ssid(Ssid),
    Bssid(MacAddress),
    /// Only the BSS with this SSID and BSSID matches.
    SsidAndBssid(Ssid, MacAddress),
}
impl NetworkTarget {
    pub fn ssid(&self) -> Option<&Ssid> {
        match self {
            Self::Ssid(ssid) | Self::SsidAndBssid(ssid, _) => Some(ssid),
            Self::Bssid(_) => None,
        }
    }
    pub fn bssid(&self) -> Option<MacAddress> {
        match self {
            Self::Bssid(bssid) | Self::SsidAndBssid(_, bssid) => Some(*bssid),
            Self::Ssid(_) => None,
        }
    }
}

/// The role a profile is used in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    /// A network to join.
    Station,
    /// A network hosted by this device.
    MicroAp,
}

/// A set of IPv4 parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ipv4Settings {
    pub address: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub dns1: Ipv4Addr,
    pub dns2: Ipv4Addr,
}
impl Ipv4Settings {
    pub const UNSPECIFIED: Self = Self {
        address: Ipv4Addr::UNSPECIFIED,
        gateway: Ipv4Addr::UNSPECIFIED,
        netmask: Ipv4Addr::UNSPECIFIED,
        dns1: Ipv4Addr::UNSPECIFIED,
        dns2: Ipv4Addr::UNSPECIFIED,
    };
}

/// How the IPv4 address is obtained.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressMode {
    #[default]
    Dhcp,
    Static(Ipv4Settings),
}

/// IP configuration of a profile.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct IpConfig {
    pub ipv4: AddressMode,
}
impl IpConfig {
    pub const fn dhcp() -> Self {
        Self {
            ipv4: AddressMode::Dhcp,
        }
    }
    pub const fn static_ipv4(settings: Ipv4Settings) -> Self {
        Self {
            ipv4: AddressMode::Static(settings),
        }
    }
}

/// The addresses an interface ended up with.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InterfaceAddress {
    pub ipv4: Ipv4Settings,
    pub ipv6: heapless::Vec<Ipv6Addr, MAX_IPV6_ADDRESSES>,
}
impl InterfaceAddress {
    pub const fn ipv4(ipv4: Ipv4Settings) -> Self {
        Self {
            ipv4,
            ipv6: heapless::Vec::new(),
        }
    }
}

/// One configured network.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NetworkProfile {
    /// The unique name of this profile.
    pub name: NetworkName,
    pub target: NetworkTarget,
    /// The channel to use. Zero means any channel.
    pub channel: u8,
    pub role: Role,
    pub security: Security,
    pub ip: IpConfig,
}
impl NetworkProfile {
    fn name(name: &str) -> WlanResult<NetworkName> {
        NetworkName::try_from(name).map_err(|_| WlanError::InvalidArgument)
    }
    /// Create a station profile, which uses DHCP and any channel.
    pub fn station(name: &str, target: NetworkTarget, security: Security) -> WlanResult<Self> {
        Ok(Self {
            name: Self::name(name)?,
            target,
            channel: 0,
            role: Role::Station,
            security,
            ip: IpConfig::dhcp(),
        })
    }
    /// Create a micro-AP profile with a static address.
    pub fn micro_ap(
        name: &str,
        ssid: Ssid,
        security: Security,
        address: Ipv4Settings,
    ) -> WlanResult<Self> {
        Ok(Self {
            name: Self::name(name)?,
            target: NetworkTarget::Ssid(ssid),
            channel: 0,
            role: Role::MicroAp,
            security,
            ip: IpConfig::static_ipv4(address),
        })
    }
    /// The default micro-AP profile "uap-network" on 192.168.10.1/24 with auto channel.
    pub fn default_uap(ssid: Ssid, security: Security) -> WlanResult<Self> {
        let address = Ipv4Addr::new(192, 168, 10, 1);
        Self::micro_ap(
            "uap-network",
            ssid,
            security,
            Ipv4Settings {
                address,
                gateway: address,
                netmask: Ipv4Addr::new(255, 255, 255, 0),
                ..Ipv4Settings::UNSPECIFIED
            },
        )
    }
    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }
    pub fn with_ip(mut self, ip: IpConfig) -> Self {
        self.ip = ip;
        self
    }
    pub fn ssid(&self) -> Option<&Ssid> {
        self.target.ssid()
    }
    pub fn bssid(&self) -> Option<MacAddress> {
        self.target.bssid()
    }
    /// Check if the profile pins a channel.
    pub const fn channel_specific(&self) -> bool {
        self.channel != 0
    }
    /// Check the invariants, that the type system can't express.
    pub(crate) fn validate(&self) -> WlanResult<()> {
        if self.name.is_empty() {
            return Err(WlanError::InvalidArgument);
        }
        if self.ssid().is_some_and(Ssid::is_empty) {
            return Err(WlanError::InvalidArgument);
        }
        if self.bssid().is_some_and(|bssid| bssid.is_zero()) && self.ssid().is_none() {
            return Err(WlanError::InvalidArgument);
        }
        Ok(())
    }
}
