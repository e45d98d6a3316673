//! # `wlan-cmgr`
//! A driver independent WLAN connection manager for embedded devices, which supports a station
//! and a micro-AP (uAP) interface at the same time.
//!
//! ## Overview
//! The manager is split into two halves. The [WlanManager] is the facade, which is shared between
//! all tasks of the application. Every request made through it is validated immediately, so that
//! malformed requests fail synchronously with a [WlanError]. Accepted requests are put into a
//! queue and executed by the [Runner], which owns the [Radio] and runs the connection state
//! machine. The outcome of a request is reported to the [EventSink] as a [WlanEvent].
//!
//! ```text
//! caller ──► WlanManager ──► command queue ──► Runner ──► Radio
//!                 ▲                              │  ▲
//!                 └──── shared state ◄───────────┘  └── RadioEvent queue ◄── driver
//! ```
//!
//! ### Connecting
//! A connection attempt scans for the network of the profile, picks the matching BSS with the
//! strongest signal, associates with it and obtains an address. If the network isn't found, the
//! scan is repeated up to [WlanConfig::rescan_limit] times. While an attempt is in progress, a
//! newer `connect`, `disconnect` or `stop` request aborts it, so the station always follows the
//! latest request.
//!
//! ### Power save
//! The station supports IEEE power save while connected and deep sleep or power down while
//! disconnected. The micro-AP can independently use DTIM or inactivity based sleep. Entering and
//! leaving a mode is reported with [WlanEvent::PsEnter] and [WlanEvent::PsExit].
//!
//! ## Sharing
//! By default all synchronization uses a `NoopRawMutex`, so the manager can only be shared
//! between tasks of one executor. Enabling the `critical_section` feature switches to a
//! `CriticalSectionRawMutex`.

#![cfg_attr(not(test), no_std)]
pub(crate) mod fmt;

mod config;
mod error;
mod event;
mod manager;
mod power;
mod profile;
mod radio;
mod runner;
mod scan;
mod state;
mod store;
mod sync;

pub use config::*;
pub use error::{WlanError, WlanResult};
pub use event::{EventSink, WlanEvent};
pub use manager::{WlanManager, COMMAND_QUEUE_DEPTH, RADIO_EVENT_QUEUE_DEPTH};
pub use power::{
    IeeePsConfig, InactivitySleepParams, PowerSaveKind, PsMode, UapPsConfig, UapPsMode,
    WakeupConditions,
};
pub use profile::*;
pub use radio::*;
pub use runner::Runner;
pub use scan::{
    ChannelScan, CipherFlags, OweTransition, OweTransitionMode, ScanParams, ScanResult,
    ScanResultSet, ScanResults, ScanType, SecurityFlags, DEFAULT_DWELL_TIME_MS,
    MAX_SCAN_CHANNELS,
};
pub use state::{ConnectionState, ConnectionStats, ManagerStatus, UapConnectionState};

#[cfg(not(feature = "critical_section"))]
type DefaultRawMutex = embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(feature = "critical_section")]
type DefaultRawMutex = embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
