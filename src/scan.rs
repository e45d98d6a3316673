//! Scan results and matching them against profiles.
use bitfield_struct::bitfield;

use crate::{
    config::MAX_SCAN_RESULTS,
    profile::{MacAddress, NetworkProfile, NetworkTarget, Role, SaePassword, Security, Ssid},
    WlanError, WlanResult,
};

/// The security schemes advertised by a BSS.
#[bitfield(u8)]
#[derive(PartialEq, Eq, Hash)]
pub struct SecurityFlags {
    pub wep: bool,
    pub wpa: bool,
    pub wpa2: bool,
    pub wpa3_sae: bool,
    pub wpa2_enterprise: bool,
    pub owe: bool,
    #[bits(2)]
    __: u8,
}
impl SecurityFlags {
    /// Check if any scheme requiring key material is advertised.
    pub const fn is_protected(&self) -> bool {
        self.wep() || self.wpa() || self.wpa2() || self.wpa3_sae()
    }
}

/// Cipher suites advertised by a BSS.
#[bitfield(u8)]
#[derive(PartialEq, Eq, Hash)]
pub struct CipherFlags {
    pub tkip: bool,
    pub ccmp: bool,
    #[bits(6)]
    __: u8,
}

/// The side of an OWE transition pair, that a BSS is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OweTransitionMode {
    /// The open BSS, which points to its OWE counterpart.
    Open,
    /// The OWE BSS, which points to its open counterpart.
    Owe,
}

/// The OWE transition element of a BSS.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OweTransition {
    pub mode: OweTransitionMode,
    /// The SSID of the counterpart.
    pub ssid: Ssid,
    /// The BSSID of the counterpart.
    pub bssid: MacAddress,
}

/// One BSS seen during a scan.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScanResult {
    pub ssid: Ssid,
    pub bssid: MacAddress,
    pub channel: u8,
    /// The role of the BSS. This is [None] for an IBSS.
    pub role: Option<Role>,
    pub security: SecurityFlags,
    pub pairwise_cipher: CipherFlags,
    pub group_cipher: CipherFlags,
    /// Signal strength in dBm.
    pub rssi: i8,
    pub wmm: bool,
    /// An HT capabilities element is present.
    pub ht: bool,
    pub pmf_required: bool,
    pub owe_transition: Option<OweTransition>,
}

/// The results of one scan, as filled in by the radio.
pub type ScanResultSet = heapless::Vec<ScanResult, MAX_SCAN_RESULTS>;

/// The maximum number of channels in a user supplied channel list.
pub const MAX_SCAN_CHANNELS: usize = 14;
/// Dwell time used when none is given.
pub const DEFAULT_DWELL_TIME_MS: u16 = 120;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanType {
    #[default]
    Active,
    Passive,
}

/// Scan parameters for one channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelScan {
    pub channel: u8,
    pub scan_type: ScanType,
    /// Time spent on the channel in milliseconds. Must be in the range 50..=500.
    pub dwell_time_ms: u16,
}
impl ChannelScan {
    pub const fn active(channel: u8) -> Self {
        Self {
            channel,
            scan_type: ScanType::Active,
            dwell_time_ms: DEFAULT_DWELL_TIME_MS,
        }
    }
}

/// Parameters for a scan.
///
/// The default parameters scan all channels for any network.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScanParams {
    /// Only report this SSID and send directed probes for it.
    pub ssid: Option<Ssid>,
    /// Only report this BSSID.
    pub bssid: Option<MacAddress>,
    /// The channels to scan. An empty list means all channels.
    pub channels: heapless::Vec<ChannelScan, MAX_SCAN_CHANNELS>,
    /// Number of probe requests per channel. Must be in the range 1..=4.
    pub probe_count: u8,
}
impl Default for ScanParams {
    fn default() -> Self {
        Self {
            ssid: None,
            bssid: None,
            channels: heapless::Vec::new(),
            probe_count: 1,
        }
    }
}
impl ScanParams {
    /// The parameters used while looking for the network of a profile.
    pub(crate) fn for_profile(profile: &NetworkProfile) -> Self {
        let mut params = Self {
            ssid: profile.ssid().cloned(),
            bssid: profile.bssid(),
            ..Default::default()
        };
        if profile.channel_specific() {
            let _ = params.channels.push(ChannelScan::active(profile.channel));
        }
        params
    }
    /// The parameters used while looking for the OWE side of a transition pair.
    pub(crate) fn for_transition(ssid: &Ssid) -> Self {
        Self {
            ssid: Some(ssid.clone()),
            ..Default::default()
        }
    }
    pub(crate) fn validate(&self) -> WlanResult<()> {
        if !(1..=4).contains(&self.probe_count) {
            return Err(WlanError::InvalidArgument);
        }
        if self.ssid.as_ref().is_some_and(Ssid::is_empty) {
            return Err(WlanError::InvalidArgument);
        }
        let valid_channels = self.channels.iter().all(|channel| {
            matches!(channel.channel, 1..=14 | 36..=177)
                && (50..=500).contains(&channel.dwell_time_ms)
        });
        if !valid_channels {
            return Err(WlanError::InvalidArgument);
        }
        Ok(())
    }
}

/// A read only view of the results of a scan.
///
/// This is only handed to the scan callback and can't outlive it.
pub struct ScanResults<'a> {
    results: &'a [ScanResult],
}
impl<'a> ScanResults<'a> {
    pub(crate) const fn new(results: &'a [ScanResult]) -> Self {
        Self { results }
    }
    /// The number of BSSs found.
    pub const fn count(&self) -> usize {
        self.results.len()
    }
    /// Get the result at `index`.
    pub fn get_scan_result(&self, index: usize) -> WlanResult<&'a ScanResult> {
        self.results.get(index).ok_or(WlanError::InvalidArgument)
    }
    pub fn iter(&self) -> core::slice::Iter<'a, ScanResult> {
        self.results.iter()
    }
}

/// Check if the security of a profile is compatible with what a BSS advertises.
fn security_matches(security: &Security, bss: &ScanResult) -> bool {
    let flags = bss.security;
    match security {
        Security::None => match &bss.owe_transition {
            Some(OweTransition {
                mode: OweTransitionMode::Open,
                ssid,
                ..
            }) => !ssid.is_empty(),
            Some(OweTransition {
                mode: OweTransitionMode::Owe,
                ..
            }) => flags.owe(),
            None => !flags.is_protected() && !flags.owe(),
        },
        // WEP isn't allowed with HT associations.
        Security::WepOpen(_) | Security::WepShared(_) => !bss.ht && flags.wep(),
        Security::WpaWpa2Mixed(_) => flags.wpa() || flags.wpa2(),
        Security::Wpa2(_) => flags.wpa2(),
        // WPA with TKIP alone isn't allowed, use mixed mode for those networks.
        Security::Wpa(_) => flags.wpa() && !bss.pairwise_cipher.tkip(),
        Security::OweOnly => {
            flags.owe()
                || matches!(
                    &bss.owe_transition,
                    Some(OweTransition { mode: OweTransitionMode::Open, ssid, .. }) if !ssid.is_empty()
                )
        }
        Security::Wpa2Enterprise(_) => flags.wpa2_enterprise(),
        Security::Wpa3Sae(_) => flags.wpa3_sae(),
        Security::Wildcard(Some(_)) => flags.wpa() || flags.wpa2() || flags.wpa3_sae(),
        Security::Wildcard(None) => !flags.is_protected(),
    }
}

/// Check if a BSS is a candidate for a profile.
pub(crate) fn network_matches(profile: &NetworkProfile, bss: &ScanResult) -> bool {
    if profile.channel_specific() && profile.channel != bss.channel {
        return false;
    }
    if bss.role != Some(Role::MicroAp) {
        return false;
    }
    let target_matches = match &profile.target {
        NetworkTarget::Ssid(ssid) => *ssid == bss.ssid,
        NetworkTarget::Bssid(bssid) => *bssid == bss.bssid,
        NetworkTarget::SsidAndBssid(ssid, bssid) => *ssid == bss.ssid && *bssid == bss.bssid,
    };
    // A key never opens an unprotected network.
    target_matches
        && !(profile.security.has_key() && !bss.security.is_protected())
        && security_matches(&profile.security, bss)
}

/// The BSS with the strongest signal among the candidates for a profile.
pub(crate) fn best_match<'a>(
    profile: &NetworkProfile,
    results: &'a [ScanResult],
) -> Option<&'a ScanResult> {
    results
        .iter()
        .filter(|bss| network_matches(profile, bss))
        .max_by_key(|bss| bss.rssi)
}

/// The strongest OWE BSS with the given SSID, which is the target of a transition.
pub(crate) fn best_transition_match<'a>(
    ssid: &Ssid,
    results: &'a [ScanResult],
) -> Option<&'a ScanResult> {
    results
        .iter()
        .filter(|bss| bss.ssid == *ssid && bss.security.owe())
        .max_by_key(|bss| bss.rssi)
}

/// The SSID of the OWE network, if the BSS is the open side of a transition pair.
pub(crate) fn transition_target(bss: &ScanResult) -> Option<&Ssid> {
    match &bss.owe_transition {
        Some(OweTransition {
            mode: OweTransitionMode::Open,
            ssid,
            ..
        }) if !ssid.is_empty() => Some(ssid),
        _ => None,
    }
}

/// Resolve the security used with the chosen BSS.
///
/// A wildcard adopts the strongest scheme the BSS advertises, in the order WPA2, WPA/WPA2 mixed,
/// WPA3-SAE, OWE and open.
fn resolve_security(security: &Security, bss: &ScanResult) -> Security {
    let flags = bss.security;
    match security {
        Security::Wildcard(Some(passphrase)) if flags.wpa2() => Security::Wpa2(passphrase.clone()),
        Security::Wildcard(Some(passphrase)) if flags.wpa() => {
            Security::WpaWpa2Mixed(passphrase.clone())
        }
        Security::Wildcard(Some(passphrase)) if flags.wpa3_sae() => {
            match SaePassword::new(passphrase.as_str()) {
                Ok(password) => Security::Wpa3Sae(password),
                Err(_) => security.clone(),
            }
        }
        Security::Wildcard(None) if flags.owe() => Security::OweOnly,
        Security::Wildcard(None) => Security::None,
        Security::None if flags.owe() => Security::OweOnly,
        _ => security.clone(),
    }
}

/// Fill in the parameters the profile left unspecified from the chosen BSS.
///
/// The returned profile always names both SSID and BSSID and pins the channel.
pub(crate) fn resolve_network(profile: &NetworkProfile, bss: &ScanResult) -> NetworkProfile {
    let mut network = profile.clone();
    network.target = NetworkTarget::SsidAndBssid(bss.ssid.clone(), bss.bssid);
    network.channel = bss.channel;
    network.security = resolve_security(&profile.security, bss);
    network
}
