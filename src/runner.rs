use core::{future::Future, ops::ControlFlow};

use embassy_futures::select::{select, Either};
use embassy_time::{with_timeout, TimeoutError};

use crate::{
    event::{EventSink, WlanEvent},
    manager::Command,
    power::{PowerSaveKind, PsCommand, PsMode, UapPsMode},
    profile::{AddressMode, NetworkProfile, Role, Security, Ssid},
    radio::{AssociationError, PowerSaveRequest, Radio, RadioEvent},
    scan::{
        best_match, best_transition_match, resolve_network, transition_target, ScanParams,
        ScanResult, ScanResultSet,
    },
    state::{ConnectionState, ManagerStatus, UapConnectionState},
    sync::{PendingRequests, RequestId},
    WlanError, WlanManager,
};

/// The connection attempt was aborted, because another station request is pending.
struct Preempted;

/// Run `future` until it completes or a station request is queued.
async fn preemptible<F: Future>(
    preempt: &PendingRequests,
    future: F,
) -> Result<F::Output, Preempted> {
    match select(future, preempt.preempted()).await {
        Either::First(output) => Ok(output),
        Either::Second(()) => Err(Preempted),
    }
}

/// The worker of the connection manager.
///
/// It owns the radio and the event sink and executes the requests made through the
/// [WlanManager] one at a time. All state transitions happen here.
pub struct Runner<'a, R: Radio, E: EventSink> {
    manager: &'a WlanManager,
    radio: R,
    sink: E,
    /// Results of the scans for a connection attempt, which never reach the user.
    scan_buffer: ScanResultSet,
}
impl<'a, R: Radio, E: EventSink> Runner<'a, R, E> {
    pub(crate) const fn new(manager: &'a WlanManager, radio: R, sink: E) -> Self {
        Self {
            manager,
            radio,
            sink,
            scan_buffer: ScanResultSet::new(),
        }
    }
    /// Process requests until [WlanManager::stop] is called.
    ///
    /// Returns the radio, so that it can be deinitialized.
    pub async fn run(mut self) -> R {
        let manager = self.manager;
        if let Err(err) = self.radio.start().await {
            warn!("Failed to start the radio: {:?}", err);
            self.emit(WlanEvent::InitializationFailed);
            self.shutdown();
            return self.radio;
        }
        info!("Connection manager running.");
        self.emit(WlanEvent::Initialized);
        loop {
            match select(manager.commands.receive(), manager.radio_events.receive()).await {
                Either::First(command) => {
                    if command.preempts_connection() {
                        manager.preempt.take();
                    }
                    if self.handle_command(command).await.is_break() {
                        break;
                    }
                    // No connection attempt outlives the command that started it.
                    if manager.with(|shared| shared.station.is_connecting()) {
                        debug!("Tearing down an aborted connection attempt.");
                        self.teardown_station(WlanEvent::UserDisconnect).await;
                    }
                }
                Either::Second(event) => self.handle_radio_event(event).await,
            }
        }
        info!("Connection manager stopped.");
        self.radio
    }
    fn emit(&mut self, event: WlanEvent) {
        debug!("Event: {:?}", event);
        self.sink.on_event(event);
    }
    fn set_station(&self, state: ConnectionState) {
        self.manager.with(|shared| shared.station = state);
        debug!("Station state: {:?}", state);
    }
    /// Stop accepting requests and fail the ones still queued.
    fn shutdown(&mut self) {
        let manager = self.manager;
        manager.with(|shared| shared.status = ManagerStatus::Initialized);
        while let Ok(command) = manager.commands.try_receive() {
            if let Some(request) = command.request() {
                manager.reply.signal(request, Err(WlanError::StateError));
            }
            match command {
                Command::Connect(_) => self.emit(WlanEvent::ConnectFailed),
                Command::StartUap(_) => self.emit(WlanEvent::UapStartFailed),
                _ => debug!("Dropping a queued request."),
            }
        }
        manager.radio_events.clear();
        manager.preempt.reset();
    }
    async fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Connect(name) => self.connect(&name).await,
            Command::Disconnect => self.teardown_station(WlanEvent::UserDisconnect).await,
            Command::RemoveNetwork { name, request, .. } => {
                self.remove_network(&name, request).await
            }
            Command::Scan(params, request) => self.scan(&params, request).await,
            Command::StartUap(name) => self.start_uap(&name).await,
            Command::StopUap(name) => self.stop_uap(&name).await,
            Command::PowerSave(command) => self.power_save(command).await,
            Command::QuerySignal(request) => self.query_signal(request).await,
            Command::Stop(request) => {
                self.stop(request).await;
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    // Station

    /// Bring the station back to [ConnectionState::Disconnected] and report `reason`, unless it
    /// already is.
    async fn teardown_station(&mut self, reason: WlanEvent) {
        let manager = self.manager;
        let (state, ieee) = manager.with(|shared| {
            (
                shared.station,
                shared.power_save.station == PsMode::Ieee,
            )
        });
        if state == ConnectionState::Disconnected {
            return;
        }
        if state != ConnectionState::Scanning {
            self.radio.deauthenticate().await;
        }
        manager.with(|shared| {
            shared.station = ConnectionState::Disconnected;
            shared.current_network = None;
            shared.address = None;
        });
        debug!("Station state: {:?}", ConnectionState::Disconnected);
        self.emit(reason);
        if ieee {
            self.exit_ieee_ps().await;
        }
    }
    async fn exit_ieee_ps(&mut self) {
        if let Err(err) = self.radio.set_power_save(PowerSaveRequest::ExitIeee).await {
            warn!("Failed to leave IEEE power save: {:?}", err);
        }
        self.manager
            .with(|shared| shared.power_save.station = PsMode::Active);
        self.emit(WlanEvent::PsExit(PowerSaveKind::Ieee));
    }
    fn connection_failed(&mut self, reason: WlanEvent) {
        self.manager.with(|shared| {
            shared.station = ConnectionState::Disconnected;
            shared.current_network = None;
            shared.address = None;
            let stats = &mut shared.stats;
            stats.connection_failures = stats.connection_failures.saturating_add(1);
            match reason {
                WlanEvent::NetworkAuthFailed => {
                    stats.auth_failures = stats.auth_failures.saturating_add(1)
                }
                WlanEvent::NetworkNotFound => {
                    stats.network_not_found = stats.network_not_found.saturating_add(1)
                }
                _ => {}
            }
        });
        warn!("Connection attempt failed: {:?}", reason);
        self.emit(reason);
    }
    /// Scan until the target of `profile` shows up, or the scan rounds are used up.
    ///
    /// Returns the chosen BSS and the resolved network.
    async fn find_network(
        &mut self,
        profile: &NetworkProfile,
    ) -> Result<Option<(ScanResult, NetworkProfile)>, Preempted> {
        let manager = self.manager;
        let rounds = manager.with(|shared| shared.config.scan_rounds());
        let mut transition: Option<Ssid> = None;
        for round in 1..=rounds {
            let params = match &transition {
                Some(ssid) => ScanParams::for_transition(ssid),
                None => ScanParams::for_profile(profile),
            };
            self.scan_buffer.clear();
            let result = preemptible(
                &manager.preempt,
                self.radio.scan(&params, &mut self.scan_buffer),
            )
            .await?;
            if let Err(err) = result {
                warn!("Scan round {} failed: {:?}", round, err);
                continue;
            }
            match &transition {
                Some(ssid) => {
                    if let Some(bss) = best_transition_match(ssid, &self.scan_buffer) {
                        let mut network = resolve_network(profile, bss);
                        network.security = Security::OweOnly;
                        return Ok(Some((bss.clone(), network)));
                    }
                }
                None => {
                    let Some(bss) = best_match(profile, &self.scan_buffer) else {
                        debug!(
                            "Network {} not found in round {}.",
                            profile.name.as_str(),
                            round
                        );
                        continue;
                    };
                    if let Some(ssid) = transition_target(bss) {
                        debug!("Following OWE transition of {}.", bss.bssid);
                        transition = Some(ssid.clone());
                        continue;
                    }
                    return Ok(Some((bss.clone(), resolve_network(profile, bss))));
                }
            }
        }
        Ok(None)
    }
    async fn connect(&mut self, name: &str) {
        let manager = self.manager;
        self.teardown_station(WlanEvent::UserDisconnect).await;

        let profile = manager.with(|shared| {
            let powered = shared.power_save.station_powered();
            shared
                .store
                .get_by_name(name)
                .filter(|profile| powered && profile.role == Role::Station)
                .cloned()
        });
        let Some(profile) = profile else {
            warn!("Network {} can't be connected to.", name);
            self.connection_failed(WlanEvent::ConnectFailed);
            return;
        };
        manager.with(|shared| {
            shared.stats.connection_attempts = shared.stats.connection_attempts.saturating_add(1);
            shared.current_network = Some(profile.clone());
        });
        info!("Connecting to {}.", profile.name.as_str());
        self.set_station(ConnectionState::Scanning);

        let Ok(found) = self.find_network(&profile).await else {
            debug!("Connection attempt preempted while scanning.");
            return;
        };
        let Some((bss, network)) = found else {
            self.connection_failed(WlanEvent::NetworkNotFound);
            return;
        };
        debug!(
            "Selected BSS {} on channel {} with {} dBm.",
            bss.bssid,
            bss.channel,
            bss.rssi
        );
        manager.with(|shared| shared.current_network = Some(network.clone()));
        self.set_station(ConnectionState::Associating);

        let timeout = manager.with(|shared| shared.config.association_timeout);
        let Ok(association) = preemptible(
            &manager.preempt,
            with_timeout(timeout, self.radio.associate(&bss, &network)),
        )
        .await
        else {
            debug!("Connection attempt preempted while associating.");
            return;
        };
        let failure = match association {
            Ok(Ok(())) => None,
            Ok(Err(AssociationError::AuthenticationFailed | AssociationError::Rejected)) => {
                Some(WlanEvent::NetworkAuthFailed)
            }
            Ok(Err(AssociationError::NotFound)) => Some(WlanEvent::NetworkNotFound),
            Ok(Err(AssociationError::Driver(err))) => {
                warn!("Association failed in the driver: {:?}", err);
                Some(WlanEvent::ConnectFailed)
            }
            Err(TimeoutError) => {
                warn!("Association timed out.");
                Some(WlanEvent::NetworkAuthFailed)
            }
        };
        if let Some(reason) = failure {
            self.radio.deauthenticate().await;
            self.connection_failed(reason);
            return;
        }
        self.set_station(ConnectionState::Associated);

        let dhcp = matches!(network.ip.ipv4, AddressMode::Dhcp);
        let timeout = manager.with(|shared| shared.config.address_timeout);
        self.set_station(ConnectionState::ObtainingAddress);
        let Ok(address) = preemptible(
            &manager.preempt,
            with_timeout(timeout, self.radio.configure_address(&network.ip)),
        )
        .await
        else {
            debug!("Connection attempt preempted while obtaining an address.");
            return;
        };
        match address {
            Ok(Ok(address)) => {
                manager.with(|shared| {
                    shared.station = ConnectionState::Connected;
                    shared.address = Some(address);
                    let stats = &mut shared.stats;
                    stats.connection_successes = stats.connection_successes.saturating_add(1);
                    if dhcp {
                        stats.dhcp_successes = stats.dhcp_successes.saturating_add(1);
                    }
                });
                info!("Connected to {}.", network.name.as_str());
                self.emit(WlanEvent::Success);
            }
            failure => {
                if let Ok(Err(err)) = failure {
                    warn!("Failed to configure the address: {:?}", err);
                } else {
                    warn!("Timed out obtaining an address.");
                }
                if dhcp {
                    manager.with(|shared| {
                        shared.stats.dhcp_failures = shared.stats.dhcp_failures.saturating_add(1)
                    });
                }
                self.radio.deauthenticate().await;
                self.connection_failed(WlanEvent::AddressFailed);
            }
        }
    }
    async fn remove_network(&mut self, name: &str, request: RequestId) {
        let manager = self.manager;
        let in_use = manager.with(|shared| {
            shared
                .current_network
                .as_ref()
                .is_some_and(|network| network.name.as_str() == name)
        });
        if in_use {
            self.teardown_station(WlanEvent::UserDisconnect).await;
        }
        let result = manager.with(|shared| {
            let backs_uap = shared.uap == UapConnectionState::Started
                && shared
                    .current_uap
                    .as_ref()
                    .is_some_and(|network| network.name.as_str() == name);
            if backs_uap {
                return Err(WlanError::StateError);
            }
            shared.store.remove(name).map(|_| ())
        });
        if result.is_ok() {
            debug!("Removed network {}.", name);
        }
        manager.reply.signal(request, result);
    }
    async fn scan(&mut self, params: &ScanParams, request: RequestId) {
        let manager = self.manager;
        if !manager.with(|shared| shared.scanning_allowed()) {
            manager.reply.signal(request, Err(WlanError::StateError));
            return;
        }
        self.scan_buffer.clear();
        if let Err(err) = self.radio.scan(params, &mut self.scan_buffer).await {
            warn!("Scan failed: {:?}", err);
            self.scan_buffer.clear();
        }
        debug!("Scan found {} networks.", self.scan_buffer.len());
        let results = &self.scan_buffer;
        manager.with(|shared| shared.scan_results = results.clone());
        manager.reply.signal(request, Ok(()));
    }
    async fn query_signal(&mut self, request: RequestId) {
        let manager = self.manager;
        if manager.with(|shared| shared.station) != ConnectionState::Connected {
            manager.reply.signal(request, Err(WlanError::StateError));
            return;
        }
        match self.radio.signal_strength().await {
            Ok(signal) => {
                manager.with(|shared| shared.signal = Some(signal));
                manager.reply.signal(request, Ok(()));
            }
            Err(err) => {
                warn!("Failed to query the signal strength: {:?}", err);
                manager.reply.signal(request, Err(WlanError::ActionError));
            }
        }
    }

    // Micro-AP

    async fn start_uap(&mut self, name: &str) {
        let manager = self.manager;
        let network = manager.with(|shared| {
            if shared.uap == UapConnectionState::Started
                || shared.power_save.station != PsMode::Active
            {
                return None;
            }
            let profile = shared
                .store
                .get_by_name(name)
                .filter(|profile| profile.role == Role::MicroAp)?;
            let channel = if profile.channel_specific() {
                profile.channel
            } else if shared.station == ConnectionState::Connected {
                shared
                    .current_network
                    .as_ref()
                    .map_or(shared.config.uap_default_channel, |network| network.channel)
            } else {
                shared.config.uap_default_channel
            };
            Some(profile.clone().with_channel(channel))
        });
        let Some(network) = network else {
            warn!("Micro-AP network {} can't be started.", name);
            self.emit(WlanEvent::UapStartFailed);
            return;
        };
        match self.radio.start_uap(&network, network.channel).await {
            Ok(()) => {
                info!(
                    "Micro-AP {} started on channel {}.",
                    network.name.as_str(),
                    network.channel
                );
                manager.with(|shared| {
                    shared.uap = UapConnectionState::Started;
                    shared.current_uap = Some(network);
                });
                self.emit(WlanEvent::UapSuccess);
            }
            Err(err) => {
                warn!("Failed to start the micro-AP: {:?}", err);
                self.emit(WlanEvent::UapStartFailed);
            }
        }
    }
    async fn stop_uap(&mut self, name: &str) {
        let manager = self.manager;
        let running = manager.with(|shared| {
            shared.uap == UapConnectionState::Started
                && shared.power_save.uap == UapPsMode::Active
                && shared
                    .current_uap
                    .as_ref()
                    .is_some_and(|network| network.name.as_str() == name)
        });
        if !running {
            warn!("Micro-AP network {} isn't running.", name);
            self.emit(WlanEvent::UapStopFailed);
            return;
        }
        match self.radio.stop_uap().await {
            Ok(()) => {
                manager.with(|shared| {
                    shared.uap = UapConnectionState::Stopped;
                    shared.current_uap = None;
                });
                info!("Micro-AP stopped.");
                self.emit(WlanEvent::UapStopped);
            }
            Err(err) => {
                warn!("Failed to stop the micro-AP: {:?}", err);
                self.emit(WlanEvent::UapStopFailed);
            }
        }
    }

    // Power save

    async fn power_save(&mut self, command: PsCommand) {
        let manager = self.manager;
        let checked = manager.with(|shared| {
            shared
                .power_save
                .check(&command, shared.station, shared.uap)
                .map(|()| shared.power_save.ieee_config)
        });
        let ieee_config = match checked {
            Ok(ieee_config) => ieee_config,
            Err(err) => {
                warn!("Power save transition {:?} refused: {}", command, err);
                return;
            }
        };
        let request = match command {
            PsCommand::IeeeOn => PowerSaveRequest::EnterIeee(ieee_config),
            PsCommand::IeeeOff => PowerSaveRequest::ExitIeee,
            PsCommand::DeepSleepOn => PowerSaveRequest::EnterDeepSleep,
            PsCommand::DeepSleepOff => PowerSaveRequest::ExitDeepSleep,
            PsCommand::PowerDownOn => PowerSaveRequest::PowerDown,
            PsCommand::PowerDownOff => PowerSaveRequest::PowerUp,
            PsCommand::UapOn(config) => PowerSaveRequest::EnterUap(config),
            PsCommand::UapOff => PowerSaveRequest::ExitUap,
        };
        if let Err(err) = self.radio.set_power_save(request).await {
            warn!("Power save transition {:?} failed: {:?}", command, err);
            return;
        }
        let (kind, entered) = manager.with(|shared| shared.power_save.apply(&command));
        self.emit(if entered {
            WlanEvent::PsEnter(kind)
        } else {
            WlanEvent::PsExit(kind)
        });
    }

    // Lifecycle

    /// Tear everything down, so that the radio is idle once the worker returns.
    async fn stop(&mut self, request: RequestId) {
        let manager = self.manager;
        self.teardown_station(WlanEvent::UserDisconnect).await;

        let (power_save, uap) = manager.with(|shared| (shared.power_save, shared.uap));
        if power_save.uap != UapPsMode::Active {
            if let Err(err) = self.radio.set_power_save(PowerSaveRequest::ExitUap).await {
                warn!("Failed to leave micro-AP power save: {:?}", err);
            }
        }
        if uap == UapConnectionState::Started {
            if let Err(err) = self.radio.stop_uap().await {
                warn!("Failed to stop the micro-AP: {:?}", err);
            }
            self.emit(WlanEvent::UapStopped);
        }
        let wakeup = match power_save.station {
            PsMode::DeepSleep => Some(PowerSaveRequest::ExitDeepSleep),
            PsMode::PowerDown => Some(PowerSaveRequest::PowerUp),
            _ => None,
        };
        if let Some(request) = wakeup {
            if let Err(err) = self.radio.set_power_save(request).await {
                warn!("Failed to wake the radio up: {:?}", err);
            }
        }
        manager.with(|shared| {
            shared.uap = UapConnectionState::Stopped;
            shared.current_uap = None;
            shared.power_save.station = PsMode::Active;
            shared.power_save.uap = UapPsMode::Active;
        });
        self.radio.stop().await;
        self.shutdown();
        manager.reply.signal(request, Ok(()));
    }

    // Driver notifications

    async fn handle_radio_event(&mut self, event: RadioEvent) {
        let manager = self.manager;
        let (station, uap) = manager.with(|shared| (shared.station, shared.uap));
        let connected = station == ConnectionState::Connected;
        let uap_started = uap == UapConnectionState::Started;
        match event {
            RadioEvent::LinkLost if connected => {
                let ieee = manager.with(|shared| {
                    shared.station = ConnectionState::Disconnected;
                    shared.current_network = None;
                    shared.address = None;
                    shared.stats.link_losses = shared.stats.link_losses.saturating_add(1);
                    shared.power_save.station == PsMode::Ieee
                });
                warn!("Link lost.");
                self.emit(WlanEvent::LinkLost);
                if ieee {
                    self.exit_ieee_ps().await;
                }
            }
            RadioEvent::ChannelSwitch(channel) if connected => {
                manager.with(|shared| {
                    if let Some(network) = shared.current_network.as_mut() {
                        network.channel = channel;
                    }
                });
                info!("Network switched to channel {}.", channel);
                self.emit(WlanEvent::ChanSwitch(channel));
            }
            RadioEvent::LeaseRenewed(address) if connected => {
                manager.with(|shared| {
                    shared.address = Some(address);
                    shared.stats.lease_renewals = shared.stats.lease_renewals.saturating_add(1);
                });
                self.emit(WlanEvent::AddressSuccess);
            }
            RadioEvent::LeaseLost if connected => {
                warn!("DHCP lease lost.");
                self.radio.deauthenticate().await;
                let ieee = manager.with(|shared| {
                    shared.station = ConnectionState::Disconnected;
                    shared.current_network = None;
                    shared.address = None;
                    shared.stats.lease_failures = shared.stats.lease_failures.saturating_add(1);
                    shared.power_save.station == PsMode::Ieee
                });
                self.emit(WlanEvent::AddressFailed);
                if ieee {
                    self.exit_ieee_ps().await;
                }
            }
            RadioEvent::UapClientAssociated(address) if uap_started => {
                debug!("Client {} associated.", address);
                self.emit(WlanEvent::UapClientAssoc(address));
            }
            RadioEvent::UapClientDissociated(address) if uap_started => {
                debug!("Client {} dissociated.", address);
                self.emit(WlanEvent::UapClientDissoc(address));
            }
            RadioEvent::WpsSessionEnded => {
                self.teardown_station(WlanEvent::WpsDisconnect).await
            }
            _ => debug!("Ignoring radio event in the current state."),
        }
    }
}
