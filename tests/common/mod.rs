#![allow(dead_code)]

use std::{
    cell::RefCell,
    future::{pending, Future},
    rc::Rc,
    time::{Duration, Instant},
};

use embassy_futures::{
    select::{select, Either},
    yield_now,
};
use wlan_cmgr::*;

/// What the mock radio sees and how it answers.
pub struct Script {
    /// The networks on air.
    pub networks: Vec<ScanResult>,
    /// Fail this many scans before answering.
    pub failing_scans: usize,
    pub scans: usize,
    pub scan_params: Vec<ScanParams>,
    pub association: Result<(), AssociationError>,
    /// Never complete the association.
    pub hang_association: bool,
    pub associations: Vec<NetworkProfile>,
    pub address: Result<InterfaceAddress, RadioError>,
    pub deauthentications: usize,
    pub start_result: Result<(), RadioError>,
    pub uap_start: Result<(), RadioError>,
    pub uap_stop: Result<(), RadioError>,
    pub uap_channel: Option<u8>,
    pub power_save: Vec<PowerSaveRequest>,
    pub power_save_result: Result<(), RadioError>,
    pub signal: Result<SignalStrength, RadioError>,
    pub stopped: bool,
    pub deinitialized: Option<DeinitAction>,
}

pub fn leased_address() -> InterfaceAddress {
    InterfaceAddress::ipv4(Ipv4Settings {
        address: [192, 168, 1, 23].into(),
        gateway: [192, 168, 1, 1].into(),
        netmask: [255, 255, 255, 0].into(),
        dns1: [192, 168, 1, 1].into(),
        dns2: [0, 0, 0, 0].into(),
    })
}

pub const MAC_ADDRESS: MacAddress = MacAddress::new([0x00, 0x50, 0x43, 0x02, 0xfe, 0x01]);

#[derive(Clone)]
pub struct MockRadio {
    pub script: Rc<RefCell<Script>>,
}
impl MockRadio {
    pub fn new() -> Self {
        Self {
            script: Rc::new(RefCell::new(Script {
                networks: Vec::new(),
                failing_scans: 0,
                scans: 0,
                scan_params: Vec::new(),
                association: Ok(()),
                hang_association: false,
                associations: Vec::new(),
                address: Ok(leased_address()),
                deauthentications: 0,
                start_result: Ok(()),
                uap_start: Ok(()),
                uap_stop: Ok(()),
                uap_channel: None,
                power_save: Vec::new(),
                power_save_result: Ok(()),
                signal: Ok(SignalStrength {
                    rssi: -42,
                    noise_floor: -92,
                    snr: 50,
                }),
                stopped: false,
                deinitialized: None,
            })),
        }
    }
    pub fn script(&self) -> std::cell::RefMut<'_, Script> {
        self.script.borrow_mut()
    }
}
impl Radio for MockRadio {
    async fn init(&mut self, _firmware: &FirmwareDescriptor<'_>) -> Result<MacAddress, RadioError> {
        Ok(MAC_ADDRESS)
    }
    async fn deinit(&mut self, action: DeinitAction) {
        self.script().deinitialized = Some(action);
    }
    async fn start(&mut self) -> Result<(), RadioError> {
        self.script().start_result
    }
    async fn stop(&mut self) {
        self.script().stopped = true;
    }
    async fn scan(
        &mut self,
        params: &ScanParams,
        results: &mut ScanResultSet,
    ) -> Result<(), RadioError> {
        yield_now().await;
        let mut script = self.script();
        script.scans += 1;
        script.scan_params.push(params.clone());
        if script.failing_scans > 0 {
            script.failing_scans -= 1;
            return Err(RadioError::Busy);
        }
        let visible = script.networks.iter().filter(|bss| {
            params.ssid.as_ref().is_none_or(|ssid| *ssid == bss.ssid)
                && params.bssid.is_none_or(|bssid| bssid == bss.bssid)
        });
        for bss in visible {
            let _ = results.push(bss.clone());
        }
        Ok(())
    }
    async fn associate(
        &mut self,
        _bss: &ScanResult,
        network: &NetworkProfile,
    ) -> Result<(), AssociationError> {
        self.script().associations.push(network.clone());
        if self.script().hang_association {
            pending::<()>().await;
        }
        self.script().association
    }
    async fn deauthenticate(&mut self) {
        self.script().deauthentications += 1;
    }
    async fn configure_address(&mut self, ip: &IpConfig) -> Result<InterfaceAddress, RadioError> {
        match ip.ipv4 {
            AddressMode::Static(settings) => Ok(InterfaceAddress::ipv4(settings)),
            AddressMode::Dhcp => self.script().address.clone(),
        }
    }
    async fn start_uap(&mut self, _network: &NetworkProfile, channel: u8) -> Result<(), RadioError> {
        let mut script = self.script();
        script.uap_channel = Some(channel);
        script.uap_start
    }
    async fn stop_uap(&mut self) -> Result<(), RadioError> {
        let mut script = self.script();
        script.uap_stop?;
        script.uap_channel = None;
        Ok(())
    }
    async fn set_power_save(&mut self, request: PowerSaveRequest) -> Result<(), RadioError> {
        let mut script = self.script();
        script.power_save.push(request);
        script.power_save_result
    }
    async fn signal_strength(&mut self) -> Result<SignalStrength, RadioError> {
        self.script().signal
    }
}

/// Records the events emitted by the manager.
#[derive(Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<WlanEvent>>>);
impl EventLog {
    pub fn sink(&self) -> impl FnMut(WlanEvent) {
        let events = self.0.clone();
        move |event| events.borrow_mut().push(event)
    }
    pub fn events(&self) -> Vec<WlanEvent> {
        self.0.borrow().clone()
    }
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
    pub fn contains(&self, event: WlanEvent) -> bool {
        self.0.borrow().contains(&event)
    }
    /// Wait until `event` was emitted.
    pub async fn wait_for(&self, event: WlanEvent) {
        settle_until(|| self.contains(event)).await
    }
}

/// Let the worker run until `condition` holds.
pub async fn settle_until(mut condition: impl FnMut() -> bool) {
    let start = Instant::now();
    while !condition() {
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "condition not reached"
        );
        yield_now().await;
    }
}

/// Let the worker drain its queues.
pub async fn settle() {
    for _ in 0..64 {
        yield_now().await;
    }
}

/// Initialize and start the manager, then run `body` next to the worker.
pub async fn with_runner<F: Future>(
    manager: &WlanManager,
    radio: &MockRadio,
    events: &EventLog,
    body: F,
) -> F::Output {
    let mut driver = radio.clone();
    manager
        .init(&mut driver, &FirmwareDescriptor::default())
        .await
        .unwrap();
    let runner = manager.start(driver, events.sink()).unwrap();
    match select(runner.run(), body).await {
        Either::First(_) => panic!("worker returned early"),
        Either::Second(output) => output,
    }
}

/// Connect to `name` and wait for the outcome.
pub async fn connect(manager: &WlanManager, events: &EventLog, name: &str) -> WlanEvent {
    let before = events.events().len();
    manager.connect(name).await.unwrap();
    settle_until(|| {
        events.events()[before..]
            .iter()
            .any(WlanEvent::is_connect_outcome)
    })
    .await;
    events.events()[before..]
        .iter()
        .copied()
        .find(WlanEvent::is_connect_outcome)
        .unwrap()
}

pub fn access_point(ssid: &str, last_octet: u8, rssi: i8, security: SecurityFlags) -> ScanResult {
    ScanResult {
        ssid: Ssid::new(ssid).unwrap(),
        bssid: MacAddress::new([0x02, 0x00, 0x00, 0x00, 0x00, last_octet]),
        channel: 6,
        role: Some(Role::MicroAp),
        security,
        pairwise_cipher: CipherFlags::new().with_ccmp(true),
        group_cipher: CipherFlags::new().with_ccmp(true),
        rssi,
        wmm: true,
        ht: true,
        pmf_required: false,
        owe_transition: None,
    }
}

pub fn wpa2() -> SecurityFlags {
    SecurityFlags::new().with_wpa2(true)
}

pub fn home_profile() -> NetworkProfile {
    NetworkProfile::station(
        "home",
        NetworkTarget::Ssid(Ssid::new("HomeNet").unwrap()),
        Security::Wpa2(Passphrase::new("correct horse battery").unwrap()),
    )
    .unwrap()
}

pub fn uap_profile() -> NetworkProfile {
    NetworkProfile::default_uap(
        Ssid::new("device-setup").unwrap(),
        Security::Wpa2(Passphrase::new("provision me").unwrap()),
    )
    .unwrap()
}

pub fn fast_config() -> WlanConfig {
    WlanConfig {
        association_timeout: embassy_time::Duration::from_millis(50),
        address_timeout: embassy_time::Duration::from_millis(50),
        ..Default::default()
    }
}
