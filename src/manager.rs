use core::cell::RefCell;

use embassy_sync::{
    blocking_mutex,
    channel::{Channel, DynamicSender},
    mutex::Mutex,
};
use portable_atomic::{AtomicU16, Ordering};

use crate::{
    config::WlanConfig,
    event::EventSink,
    power::{IeeePsConfig, PowerSaveState, PsCommand, PsMode, UapPsConfig, UapPsMode},
    profile::{
        AddressMode, InterfaceAddress, Ipv4Settings, MacAddress, NetworkName, NetworkProfile, Role,
    },
    radio::{DeinitAction, FirmwareDescriptor, Radio, RadioEvent, SignalStrength},
    runner::Runner,
    scan::{ScanParams, ScanResultSet, ScanResults},
    state::{ConnectionState, ConnectionStats, ManagerStatus, UapConnectionState},
    store::ProfileStore,
    sync::{PendingRequests, ReplySignal, RequestId},
    DefaultRawMutex, WlanError, WlanResult,
};

/// Depth of the request queue.
pub const COMMAND_QUEUE_DEPTH: usize = 8;
/// Depth of the queue for notifications from the driver.
pub const RADIO_EVENT_QUEUE_DEPTH: usize = 8;

/// A request executed by the worker.
#[derive(Clone, Debug)]
pub(crate) enum Command {
    Connect(NetworkName),
    Disconnect,
    /// Remove a profile, which is in use by the station.
    RemoveNetwork {
        name: NetworkName,
        /// The profile is the target of a connection attempt in progress.
        abort_attempt: bool,
        request: RequestId,
    },
    Scan(ScanParams, RequestId),
    StartUap(NetworkName),
    StopUap(NetworkName),
    PowerSave(PsCommand),
    QuerySignal(RequestId),
    Stop(RequestId),
}
impl Command {
    /// Check if this command aborts a connection attempt in progress.
    pub(crate) const fn preempts_connection(&self) -> bool {
        match self {
            Self::Connect(_) | Self::Disconnect | Self::Stop(_) => true,
            Self::RemoveNetwork { abort_attempt, .. } => *abort_attempt,
            _ => false,
        }
    }
    /// The request waiting for a reply to this command.
    pub(crate) const fn request(&self) -> Option<RequestId> {
        match self {
            Self::RemoveNetwork { request, .. }
            | Self::Scan(_, request)
            | Self::QuerySignal(request)
            | Self::Stop(request) => Some(*request),
            _ => None,
        }
    }
}

/// State shared between the facade and the worker.
pub(crate) struct Shared {
    pub config: WlanConfig,
    pub status: ManagerStatus,
    pub store: ProfileStore,
    pub station: ConnectionState,
    /// The resolved network of the station, while it's not disconnected.
    pub current_network: Option<NetworkProfile>,
    pub address: Option<InterfaceAddress>,
    pub uap: UapConnectionState,
    pub current_uap: Option<NetworkProfile>,
    pub power_save: PowerSaveState,
    pub mac_address: MacAddress,
    pub stats: ConnectionStats,
    /// Hands the results of a user scan over to the caller.
    pub scan_results: ScanResultSet,
    pub signal: Option<SignalStrength>,
}
impl Shared {
    const fn new(config: WlanConfig) -> Self {
        Self {
            config,
            status: ManagerStatus::Inactive,
            store: ProfileStore::new(),
            station: ConnectionState::Disconnected,
            current_network: None,
            address: None,
            uap: UapConnectionState::Stopped,
            current_uap: None,
            power_save: PowerSaveState::new(),
            mac_address: MacAddress::ZERO,
            stats: ConnectionStats::new(),
            scan_results: ScanResultSet::new(),
            signal: None,
        }
    }
    pub(crate) fn scanning_allowed(&self) -> bool {
        !self.station.is_connecting() && !self.power_save.any_configured()
    }
}

/// The WLAN connection manager.
///
/// This is the facade, through which all requests are made. Requests are validated immediately
/// and then handed to the worker ([Runner]), which executes them one at a time and reports the
/// outcome through the [EventSink]. The manager is meant to be placed in a `static` or a
/// `StaticCell`, so that it can be shared between tasks.
pub struct WlanManager {
    pub(crate) shared: blocking_mutex::Mutex<DefaultRawMutex, RefCell<Shared>>,
    pub(crate) commands: Channel<DefaultRawMutex, Command, COMMAND_QUEUE_DEPTH>,
    pub(crate) radio_events: Channel<DefaultRawMutex, RadioEvent, RADIO_EVENT_QUEUE_DEPTH>,
    pub(crate) preempt: PendingRequests,
    pub(crate) reply: ReplySignal,
    next_request: AtomicU16,
    request_lock: Mutex<DefaultRawMutex, ()>,
    scan_lock: Mutex<DefaultRawMutex, ()>,
}
impl WlanManager {
    pub const fn new(config: WlanConfig) -> Self {
        Self {
            shared: blocking_mutex::Mutex::new(RefCell::new(Shared::new(config))),
            commands: Channel::new(),
            radio_events: Channel::new(),
            preempt: PendingRequests::new(),
            reply: ReplySignal::new(),
            next_request: AtomicU16::new(0),
            request_lock: Mutex::new(()),
            scan_lock: Mutex::new(()),
        }
    }
    pub(crate) fn with<T>(&self, f: impl FnOnce(&mut Shared) -> T) -> T {
        self.shared.lock(|shared| f(&mut shared.borrow_mut()))
    }
    fn running<T>(&self, f: impl FnOnce(&mut Shared) -> WlanResult<T>) -> WlanResult<T> {
        self.with(|shared| {
            if shared.status != ManagerStatus::Running {
                return Err(WlanError::StateError);
            }
            f(shared)
        })
    }
    async fn enqueue(&self, command: Command) {
        if command.preempts_connection() {
            self.preempt.put();
        }
        self.commands.send(command).await;
    }
    /// Hand a command to the worker and wait for it to complete.
    ///
    /// If the returned future is dropped, the worker still executes the command, but its reply is
    /// ignored by later requests.
    async fn request(&self, command: impl FnOnce(RequestId) -> Command) -> WlanResult<()> {
        let _guard = self.request_lock.lock().await;
        // The worker may have stopped, while we waited for the lock.
        self.running(|_| Ok(()))?;
        let id = self.next_request.fetch_add(1, Ordering::Relaxed);
        self.enqueue(command(id)).await;
        self.reply.wait(id).await
    }

    // Lifecycle

    /// Load the firmware and read the MAC address.
    pub async fn init<R: Radio>(
        &self,
        radio: &mut R,
        firmware: &FirmwareDescriptor<'_>,
    ) -> WlanResult<()> {
        if self.with(|shared| shared.status) != ManagerStatus::Inactive {
            return Err(WlanError::StateError);
        }
        let mac_address = match radio.init(firmware).await {
            Ok(mac_address) => firmware.mac_address.unwrap_or(mac_address),
            Err(err) => {
                warn!("Radio initialization failed: {:?}", err);
                return Err(WlanError::ActionError);
            }
        };
        self.with(|shared| {
            shared.mac_address = mac_address;
            shared.status = ManagerStatus::Initialized;
        });
        info!("Initialized with MAC address {}.", mac_address);
        Ok(())
    }
    /// Start accepting requests.
    ///
    /// The returned [Runner] has to be polled for any request to be executed. It emits
    /// [WlanEvent::Initialized](crate::WlanEvent::Initialized) once it's up.
    pub fn start<R: Radio, E: EventSink>(
        &self,
        radio: R,
        sink: E,
    ) -> WlanResult<Runner<'_, R, E>> {
        self.with(|shared| {
            if shared.status != ManagerStatus::Initialized {
                return Err(WlanError::StateError);
            }
            shared.status = ManagerStatus::Running;
            Ok(())
        })?;
        self.preempt.reset();
        self.commands.clear();
        self.radio_events.clear();
        Ok(Runner::new(self, radio, sink))
    }
    /// Stop the worker.
    ///
    /// The station is disconnected and the micro-AP is stopped. Once this returns, the future of
    /// [Runner::run] completes and hands back the radio.
    ///
    /// Requests still queued behind the stop are dropped. A dropped `connect` reports
    /// [ConnectFailed](crate::WlanEvent::ConnectFailed) and a dropped `start_network` reports
    /// [UapStartFailed](crate::WlanEvent::UapStartFailed). Dropped disconnect, `stop_network`
    /// and power save requests report nothing, since the radio ends up idle anyway.
    pub async fn stop(&self) -> WlanResult<()> {
        self.running(|_| Ok(()))?;
        self.request(Command::Stop).await
    }
    /// Shut the radio down and forget all state, including the stored profiles.
    pub async fn deinit<R: Radio>(&self, radio: &mut R, action: DeinitAction) -> WlanResult<()> {
        if self.with(|shared| shared.status) != ManagerStatus::Initialized {
            return Err(WlanError::StateError);
        }
        radio.deinit(action).await;
        self.with(|shared| *shared = Shared::new(shared.config));
        info!("Deinitialized.");
        Ok(())
    }
    /// A sender for notifications from the driver.
    pub fn radio_events(&self) -> DynamicSender<'_, RadioEvent> {
        self.radio_events.dyn_sender()
    }

    // Profiles

    /// Store a copy of the profile.
    pub fn add_network(&self, profile: &NetworkProfile) -> WlanResult<()> {
        self.with(|shared| {
            if profile.role == Role::Station && shared.station.is_connecting() {
                return Err(WlanError::StateError);
            }
            let enterprise_only = shared.config.wpa2_enterprise_only;
            shared.store.add(profile, enterprise_only)?;
            debug!("Added network {}.", profile.name.as_str());
            Ok(())
        })
    }
    /// Remove a profile.
    ///
    /// If the station is using the profile, it's disconnected first. A connection attempt to the
    /// profile is aborted.
    pub async fn remove_network(&self, name: &str) -> WlanResult<()> {
        let in_use = self.with(|shared| {
            if shared.store.get_by_name(name).is_none() {
                return Err(WlanError::InvalidArgument);
            }
            let backs_uap = shared.uap == UapConnectionState::Started
                && shared
                    .current_uap
                    .as_ref()
                    .is_some_and(|network| network.name.as_str() == name);
            if backs_uap {
                return Err(WlanError::StateError);
            }
            let in_use = shared.station != ConnectionState::Disconnected
                && shared
                    .current_network
                    .as_ref()
                    .is_some_and(|network| network.name.as_str() == name);
            if !in_use {
                shared.store.remove(name)?;
                debug!("Removed network {}.", name);
                return Ok(None);
            }
            Ok(Some(shared.station.is_connecting()))
        })?;
        let Some(abort_attempt) = in_use else {
            return Ok(());
        };
        let name = NetworkName::try_from(name).map_err(|_| WlanError::InvalidArgument)?;
        self.request(|request| Command::RemoveNetwork {
            name,
            abort_attempt,
            request,
        })
        .await
    }
    pub fn get_network(&self, index: usize) -> WlanResult<NetworkProfile> {
        self.with(|shared| shared.store.get(index).cloned())
            .ok_or(WlanError::InvalidArgument)
    }
    pub fn get_network_byname(&self, name: &str) -> WlanResult<NetworkProfile> {
        self.with(|shared| shared.store.get_by_name(name).cloned())
            .ok_or(WlanError::InvalidArgument)
    }
    pub fn get_network_count(&self) -> usize {
        self.with(|shared| shared.store.count())
    }

    // Station

    /// Connect to the network with this name.
    ///
    /// This returns once the request was accepted. The outcome is reported as
    /// [Success](crate::WlanEvent::Success), [NetworkNotFound](crate::WlanEvent::NetworkNotFound),
    /// [NetworkAuthFailed](crate::WlanEvent::NetworkAuthFailed),
    /// [AddressFailed](crate::WlanEvent::AddressFailed) or
    /// [ConnectFailed](crate::WlanEvent::ConnectFailed).
    pub async fn connect(&self, name: &str) -> WlanResult<()> {
        let name = self.running(|shared| {
            if !shared.power_save.station_powered() {
                return Err(WlanError::StateError);
            }
            match shared.store.get_by_name(name) {
                Some(profile) if profile.role == Role::Station => Ok(profile.name.clone()),
                _ => Err(WlanError::InvalidArgument),
            }
        })?;
        self.enqueue(Command::Connect(name)).await;
        Ok(())
    }
    /// Disconnect the station or abort a connection attempt.
    pub async fn disconnect(&self) -> WlanResult<()> {
        self.running(|_| Ok(()))?;
        self.enqueue(Command::Disconnect).await;
        Ok(())
    }
    pub fn get_connection_state(&self) -> WlanResult<ConnectionState> {
        self.running(|shared| Ok(shared.station))
    }
    /// The network the station is associated with.
    ///
    /// Unspecified parameters of the profile are filled in from the chosen BSS.
    pub fn get_current_network(&self) -> WlanResult<NetworkProfile> {
        self.with(|shared| {
            if !shared.station.is_associated() {
                return None;
            }
            shared.current_network.clone()
        })
        .ok_or(WlanError::StateError)
    }
    pub fn get_stats(&self) -> ConnectionStats {
        self.with(|shared| shared.stats)
    }

    // Micro-AP

    /// Start the micro-AP with this profile.
    pub async fn start_network(&self, name: &str) -> WlanResult<()> {
        let name = self.running(|shared| {
            if shared.uap == UapConnectionState::Started
                || shared.power_save.station != PsMode::Active
            {
                return Err(WlanError::StateError);
            }
            let profile = shared
                .store
                .get_by_name(name)
                .filter(|profile| profile.role == Role::MicroAp)
                .ok_or(WlanError::InvalidArgument)?;
            if profile.ssid().is_none() || !matches!(profile.ip.ipv4, AddressMode::Static(_)) {
                return Err(WlanError::InvalidArgument);
            }
            if profile.channel_specific() && shared.station != ConnectionState::Disconnected {
                return Err(WlanError::InvalidArgument);
            }
            Ok(profile.name.clone())
        })?;
        self.enqueue(Command::StartUap(name)).await;
        Ok(())
    }
    /// Stop the micro-AP, which must be running with this profile.
    pub async fn stop_network(&self, name: &str) -> WlanResult<()> {
        let name = self.running(|shared| {
            if shared.power_save.uap != UapPsMode::Active {
                return Err(WlanError::StateError);
            }
            let profile = shared
                .store
                .get_by_name(name)
                .filter(|profile| profile.role == Role::MicroAp && profile.ssid().is_some())
                .ok_or(WlanError::InvalidArgument)?;
            if shared.uap != UapConnectionState::Started {
                return Err(WlanError::StateError);
            }
            if shared
                .current_uap
                .as_ref()
                .is_none_or(|network| network.name != profile.name)
            {
                return Err(WlanError::InvalidArgument);
            }
            Ok(profile.name.clone())
        })?;
        self.enqueue(Command::StopUap(name)).await;
        Ok(())
    }
    pub fn get_uap_connection_state(&self) -> WlanResult<UapConnectionState> {
        self.running(|shared| Ok(shared.uap))
    }
    pub fn get_current_uap_network(&self) -> WlanResult<NetworkProfile> {
        self.with(|shared| {
            if shared.uap != UapConnectionState::Started {
                return None;
            }
            shared.current_uap.clone()
        })
        .ok_or(WlanError::StateError)
    }

    // Scanning

    /// Scan all channels for networks.
    ///
    /// See [WlanManager::scan_with_opt].
    pub async fn scan<F>(&self, callback: F) -> WlanResult<()>
    where
        F: FnOnce(&ScanResults<'_>),
    {
        self.scan_with_opt(ScanParams::default(), callback).await
    }
    /// Scan for networks.
    ///
    /// Once the scan completed, `callback` is called exactly once with the results. If another
    /// scan is in progress, this waits for it to complete first. A scan, which failed in the
    /// radio, yields no results.
    pub async fn scan_with_opt<F>(&self, params: ScanParams, callback: F) -> WlanResult<()>
    where
        F: FnOnce(&ScanResults<'_>),
    {
        params.validate()?;
        self.running(|shared| {
            if shared.scanning_allowed() {
                Ok(())
            } else {
                Err(WlanError::StateError)
            }
        })?;
        let _guard = self.scan_lock.lock().await;
        self.request(|request| Command::Scan(params, request))
            .await?;
        let results = self.with(|shared| core::mem::take(&mut shared.scan_results));
        callback(&ScanResults::new(&results));
        Ok(())
    }

    // Power save

    async fn power_save(&self, command: PsCommand) -> WlanResult<()> {
        self.running(|shared| {
            shared
                .power_save
                .check(&command, shared.station, shared.uap)
        })?;
        self.enqueue(Command::PowerSave(command)).await;
        Ok(())
    }
    /// Enter IEEE power save. The station must be connected and the micro-AP stopped.
    pub async fn ieeeps_on(&self) -> WlanResult<()> {
        self.power_save(PsCommand::IeeeOn).await
    }
    pub async fn ieeeps_off(&self) -> WlanResult<()> {
        self.power_save(PsCommand::IeeeOff).await
    }
    /// Enter deep sleep. The station must be disconnected and the micro-AP stopped.
    pub async fn deepsleepps_on(&self) -> WlanResult<()> {
        self.power_save(PsCommand::DeepSleepOn).await
    }
    pub async fn deepsleepps_off(&self) -> WlanResult<()> {
        self.power_save(PsCommand::DeepSleepOff).await
    }
    /// Power the radio down. The station must be disconnected and the micro-AP stopped.
    pub async fn pdnps_on(&self) -> WlanResult<()> {
        self.power_save(PsCommand::PowerDownOn).await
    }
    pub async fn pdnps_off(&self) -> WlanResult<()> {
        self.power_save(PsCommand::PowerDownOff).await
    }
    /// Put the running micro-AP into power save.
    pub async fn uap_ps_on(&self, config: UapPsConfig) -> WlanResult<()> {
        self.power_save(PsCommand::UapOn(config)).await
    }
    pub async fn uap_ps_off(&self) -> WlanResult<()> {
        self.power_save(PsCommand::UapOff).await
    }
    /// Set the parameters used the next time IEEE power save is entered.
    pub fn configure_ieee_ps(&self, config: IeeePsConfig) {
        self.with(|shared| shared.power_save.ieee_config = config)
    }
    pub fn get_ps_mode(&self) -> PsMode {
        self.with(|shared| shared.power_save.station)
    }
    pub fn get_uap_ps_mode(&self) -> UapPsMode {
        self.with(|shared| shared.power_save.uap)
    }

    // Queries

    /// The address of the connected station.
    pub fn get_address(&self) -> WlanResult<InterfaceAddress> {
        self.with(|shared| {
            if shared.station != ConnectionState::Connected {
                return None;
            }
            shared.address.clone()
        })
        .ok_or(WlanError::StateError)
    }
    /// The address of the running micro-AP.
    pub fn get_uap_address(&self) -> WlanResult<Ipv4Settings> {
        self.with(|shared| match (&shared.uap, &shared.current_uap) {
            (UapConnectionState::Started, Some(network)) => match network.ip.ipv4 {
                AddressMode::Static(settings) => Some(settings),
                AddressMode::Dhcp => None,
            },
            _ => None,
        })
        .ok_or(WlanError::StateError)
    }
    pub fn get_mac_address(&self) -> WlanResult<MacAddress> {
        self.with(|shared| {
            if shared.status == ManagerStatus::Inactive {
                Err(WlanError::StateError)
            } else {
                Ok(shared.mac_address)
            }
        })
    }
    /// Query the signal strength of the current connection from the radio.
    pub async fn get_current_signal_strength(&self) -> WlanResult<SignalStrength> {
        self.running(|shared| {
            if shared.station == ConnectionState::Connected {
                Ok(())
            } else {
                Err(WlanError::StateError)
            }
        })?;
        self.request(Command::QuerySignal).await?;
        self.with(|shared| shared.signal.take())
            .ok_or(WlanError::ActionError)
    }
    /// From now on, only accept station profiles using WPA2-Enterprise.
    pub fn enable_wpa2_enterprise_ap_only(&self) {
        self.with(|shared| shared.config.wpa2_enterprise_only = true);
        info!("Only WPA2-Enterprise networks are accepted from now on.");
    }
}
