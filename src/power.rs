//! Power save modes and the rules for switching between them.
//!
//! The station supports IEEE power save, deep sleep and power down, which are mutually exclusive.
//! The micro-AP independently supports DTIM and inactivity based sleep.
use bitfield_struct::bitfield;

use crate::{
    state::{ConnectionState, UapConnectionState},
    WlanError, WlanResult,
};

/// Power save mode of the station.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PsMode {
    #[default]
    Active,
    /// IEEE 802.11 power save, while connected.
    Ieee,
    DeepSleep,
    PowerDown,
}

/// Power save mode of the micro-AP.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UapPsMode {
    #[default]
    Active,
    DtimSleep,
    InactivitySleep,
}

/// The power save mode, that was entered or left.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerSaveKind {
    Ieee,
    DeepSleep,
    PowerDown,
    UapDtimSleep,
    UapInactivitySleep,
}

/// The frames, which wake the station up from IEEE power save.
#[bitfield(u8)]
#[derive(PartialEq, Eq, Hash)]
pub struct WakeupConditions {
    pub all_broadcast: bool,
    pub unicast: bool,
    pub mac_event: bool,
    pub multicast: bool,
    pub arp_broadcast: bool,
    pub management_frame: bool,
    #[bits(2)]
    __: u8,
}

/// Parameters for IEEE power save.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IeeePsConfig {
    /// Listen interval in beacon intervals. Zero lets the radio decide.
    pub listen_interval: u16,
    /// Interval between null data frames in seconds.
    pub null_packet_interval: u8,
    pub wakeup_conditions: WakeupConditions,
}
impl IeeePsConfig {
    pub const fn new() -> Self {
        Self {
            listen_interval: 0,
            null_packet_interval: 30,
            wakeup_conditions: WakeupConditions::new()
                .with_unicast(true)
                .with_mac_event(true)
                .with_multicast(true),
        }
    }
}
impl Default for IeeePsConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Parameters for inactivity based sleep of the micro-AP, all in microseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InactivitySleepParams {
    /// Send CTS-to-self frames to protect the sleep period.
    pub protection_frames: bool,
    pub inactivity_timeout: u32,
    pub min_sleep: u32,
    pub max_sleep: u32,
    pub min_awake: u32,
    pub max_awake: u32,
}
impl InactivitySleepParams {
    pub const MIN_SLEEP: u32 = 6500;
    /// Upper bound for the sleep period, if protection frames are used.
    pub const MAX_PROTECTED_SLEEP: u32 = 32000;
    pub const MIN_AWAKE: u32 = 2000;
    pub const DEFAULT_SLEEP: u32 = 17000;
    pub const DEFAULT_AWAKE: u32 = 2000;
    pub const DEFAULT_INACTIVITY_TIMEOUT: u32 = 200000;

    pub const fn new() -> Self {
        Self {
            protection_frames: false,
            inactivity_timeout: Self::DEFAULT_INACTIVITY_TIMEOUT,
            min_sleep: Self::DEFAULT_SLEEP,
            max_sleep: Self::DEFAULT_SLEEP,
            min_awake: Self::DEFAULT_AWAKE,
            max_awake: Self::DEFAULT_AWAKE,
        }
    }
    pub(crate) fn validate(&self) -> WlanResult<()> {
        let valid = self.min_sleep >= Self::MIN_SLEEP
            && self.max_sleep >= self.min_sleep
            && !(self.protection_frames && self.max_sleep > Self::MAX_PROTECTED_SLEEP)
            && self.min_awake >= Self::MIN_AWAKE
            && self.max_awake >= self.min_awake
            && self.inactivity_timeout != 0;
        if valid {
            Ok(())
        } else {
            Err(WlanError::InvalidArgument)
        }
    }
}
impl Default for InactivitySleepParams {
    fn default() -> Self {
        Self::new()
    }
}

/// The power save mode to put the micro-AP into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UapPsConfig {
    DtimSleep,
    InactivitySleep(InactivitySleepParams),
}
impl UapPsConfig {
    pub const fn mode(&self) -> UapPsMode {
        match self {
            Self::DtimSleep => UapPsMode::DtimSleep,
            Self::InactivitySleep(_) => UapPsMode::InactivitySleep,
        }
    }
    pub(crate) const fn kind(&self) -> PowerSaveKind {
        match self {
            Self::DtimSleep => PowerSaveKind::UapDtimSleep,
            Self::InactivitySleep(_) => PowerSaveKind::UapInactivitySleep,
        }
    }
}

/// A power save transition, as requested by a caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum PsCommand {
    IeeeOn,
    IeeeOff,
    DeepSleepOn,
    DeepSleepOff,
    PowerDownOn,
    PowerDownOff,
    UapOn(UapPsConfig),
    UapOff,
}

/// The power save configuration currently in effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PowerSaveState {
    pub station: PsMode,
    pub uap: UapPsMode,
    pub ieee_config: IeeePsConfig,
}
impl PowerSaveState {
    pub const fn new() -> Self {
        Self {
            station: PsMode::Active,
            uap: UapPsMode::Active,
            ieee_config: IeeePsConfig::new(),
        }
    }
    /// Check if any power save mode is configured on either interface.
    pub fn any_configured(&self) -> bool {
        self.station != PsMode::Active || self.uap != UapPsMode::Active
    }
    /// Check if the station is powered, so that it can scan and connect.
    pub fn station_powered(&self) -> bool {
        !matches!(self.station, PsMode::DeepSleep | PsMode::PowerDown)
    }
    /// Check if a transition is allowed in the current state.
    ///
    /// This is checked once when the request is made and again by the worker, when it's
    /// executed.
    pub fn check(
        &self,
        command: &PsCommand,
        station: ConnectionState,
        uap: UapConnectionState,
    ) -> WlanResult<()> {
        let allowed = match command {
            PsCommand::IeeeOn => {
                station == ConnectionState::Connected
                    && uap == UapConnectionState::Stopped
                    && !self.any_configured()
            }
            PsCommand::DeepSleepOn | PsCommand::PowerDownOn => {
                station == ConnectionState::Disconnected
                    && uap == UapConnectionState::Stopped
                    && !self.any_configured()
            }
            PsCommand::IeeeOff => self.station == PsMode::Ieee,
            PsCommand::DeepSleepOff => self.station == PsMode::DeepSleep,
            PsCommand::PowerDownOff => self.station == PsMode::PowerDown,
            PsCommand::UapOn(config) => {
                if let UapPsConfig::InactivitySleep(params) = config {
                    params.validate()?;
                }
                uap == UapConnectionState::Started
                    && self.station_powered()
                    && self.uap == UapPsMode::Active
            }
            PsCommand::UapOff => self.uap != UapPsMode::Active,
        };
        if allowed {
            Ok(())
        } else {
            Err(WlanError::StateError)
        }
    }
    /// Record a transition, which the radio completed. Returns the event payload and whether the
    /// mode was entered.
    pub fn apply(&mut self, command: &PsCommand) -> (PowerSaveKind, bool) {
        match command {
            PsCommand::IeeeOn => {
                self.station = PsMode::Ieee;
                (PowerSaveKind::Ieee, true)
            }
            PsCommand::IeeeOff => {
                self.station = PsMode::Active;
                (PowerSaveKind::Ieee, false)
            }
            PsCommand::DeepSleepOn => {
                self.station = PsMode::DeepSleep;
                (PowerSaveKind::DeepSleep, true)
            }
            PsCommand::DeepSleepOff => {
                self.station = PsMode::Active;
                (PowerSaveKind::DeepSleep, false)
            }
            PsCommand::PowerDownOn => {
                self.station = PsMode::PowerDown;
                (PowerSaveKind::PowerDown, true)
            }
            PsCommand::PowerDownOff => {
                self.station = PsMode::Active;
                (PowerSaveKind::PowerDown, false)
            }
            PsCommand::UapOn(config) => {
                self.uap = config.mode();
                (config.kind(), true)
            }
            PsCommand::UapOff => {
                let kind = match self.uap {
                    UapPsMode::InactivitySleep => PowerSaveKind::UapInactivitySleep,
                    _ => PowerSaveKind::UapDtimSleep,
                };
                self.uap = UapPsMode::Active;
                (kind, false)
            }
        }
    }
}
