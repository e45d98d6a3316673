//! Scans for networks and connects to one of them, using a simulated radio on the host.

use embassy_futures::{block_on, join::join};
use embassy_sync::{blocking_mutex::raw::NoopRawMutex, channel::Channel};
use embassy_time::Timer;
use wlan_cmgr::{
    AddressMode, AssociationError, CipherFlags, DeinitAction, FirmwareDescriptor, IeeePsConfig,
    InterfaceAddress, IpConfig, Ipv4Settings, MacAddress, NetworkProfile, NetworkTarget,
    Passphrase, PowerSaveRequest, Radio, RadioError, Role, ScanParams, ScanResult, ScanResultSet,
    Security, SecurityFlags, SignalStrength, Ssid, WlanConfig, WlanEvent, WlanManager,
};

macro_rules! mk_static {
    ($t:ty,$val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}

type EventQueue = Channel<NoopRawMutex, WlanEvent, 8>;

fn access_point(ssid: &str, last_octet: u8, channel: u8, rssi: i8, wpa2: bool) -> ScanResult {
    let ccmp = CipherFlags::new().with_ccmp(wpa2);
    ScanResult {
        ssid: Ssid::new(ssid).unwrap(),
        bssid: MacAddress::new([0x02, 0xde, 0xad, 0xbe, 0xef, last_octet]),
        channel,
        role: Some(Role::MicroAp),
        security: SecurityFlags::new().with_wpa2(wpa2),
        pairwise_cipher: ccmp,
        group_cipher: ccmp,
        rssi,
        wmm: true,
        ht: true,
        pmf_required: false,
        owe_transition: None,
    }
}

/// A radio, which sees a fixed set of networks and always gets a lease.
struct SimulatedRadio {
    air: Vec<ScanResult>,
}
impl Radio for SimulatedRadio {
    async fn init(&mut self, _firmware: &FirmwareDescriptor<'_>) -> Result<MacAddress, RadioError> {
        Ok(MacAddress::new([0x02, 0x00, 0x00, 0x12, 0x34, 0x56]))
    }
    async fn deinit(&mut self, action: DeinitAction) {
        println!("Radio deinitialized: {action:?}");
    }
    async fn start(&mut self) -> Result<(), RadioError> {
        Ok(())
    }
    async fn stop(&mut self) {}
    async fn scan(
        &mut self,
        params: &ScanParams,
        results: &mut ScanResultSet,
    ) -> Result<(), RadioError> {
        // Dwell on the channels for a bit.
        Timer::after_millis(100).await;
        let visible = self
            .air
            .iter()
            .filter(|bss| params.ssid.as_ref().is_none_or(|ssid| *ssid == bss.ssid));
        for bss in visible {
            results.push(bss.clone()).map_err(|_| RadioError::NoMemory)?;
        }
        Ok(())
    }
    async fn associate(
        &mut self,
        bss: &ScanResult,
        _network: &NetworkProfile,
    ) -> Result<(), AssociationError> {
        println!("Associating with {} on channel {}.", bss.bssid, bss.channel);
        Timer::after_millis(50).await;
        Ok(())
    }
    async fn deauthenticate(&mut self) {}
    async fn configure_address(&mut self, ip: &IpConfig) -> Result<InterfaceAddress, RadioError> {
        Timer::after_millis(50).await;
        Ok(InterfaceAddress::ipv4(match ip.ipv4 {
            AddressMode::Static(settings) => settings,
            AddressMode::Dhcp => Ipv4Settings {
                address: [10, 0, 0, 42].into(),
                gateway: [10, 0, 0, 1].into(),
                netmask: [255, 255, 255, 0].into(),
                ..Ipv4Settings::UNSPECIFIED
            },
        }))
    }
    async fn start_uap(&mut self, _network: &NetworkProfile, _channel: u8) -> Result<(), RadioError> {
        Err(RadioError::NotSupported)
    }
    async fn stop_uap(&mut self) -> Result<(), RadioError> {
        Err(RadioError::NotSupported)
    }
    async fn set_power_save(&mut self, request: PowerSaveRequest) -> Result<(), RadioError> {
        println!("Power save: {request:?}");
        Ok(())
    }
    async fn signal_strength(&mut self) -> Result<SignalStrength, RadioError> {
        Ok(SignalStrength {
            rssi: -48,
            noise_floor: -95,
            snr: 47,
        })
    }
}

async fn next_event(events: &EventQueue) -> WlanEvent {
    let event = events.receive().await;
    println!("Event: {event:?}");
    event
}

async fn session(manager: &WlanManager, events: &EventQueue) {
    next_event(events).await;
    manager
        .scan(|results| {
            println!("Found {} networks:", results.count());
            for bss in results.iter() {
                println!(
                    "  {:<16} {} ch {:>2} {:>4} dBm {}",
                    bss.ssid.as_str().unwrap_or("<hidden>"),
                    bss.bssid,
                    bss.channel,
                    bss.rssi,
                    if bss.security.is_protected() {
                        "protected"
                    } else {
                        "open"
                    }
                );
            }
        })
        .await
        .unwrap();

    let profile = NetworkProfile::station(
        "home",
        NetworkTarget::Ssid(Ssid::new("HomeNet").unwrap()),
        Security::Wildcard(Some(Passphrase::new("correct horse battery").unwrap())),
    )
    .unwrap();
    manager.add_network(&profile).unwrap();
    manager.connect("home").await.unwrap();
    while !next_event(events).await.is_connect_outcome() {}

    if let Ok(network) = manager.get_current_network() {
        println!(
            "Connected to {} with {:?} on channel {}.",
            network.bssid().unwrap_or(MacAddress::ZERO),
            network.security.kind(),
            network.channel
        );
    }
    if let Ok(address) = manager.get_address() {
        println!("Address: {}", address.ipv4.address);
    }
    if let Ok(signal) = manager.get_current_signal_strength().await {
        println!("Signal: {} dBm, SNR {} dB", signal.rssi, signal.snr);
    }

    manager.configure_ieee_ps(IeeePsConfig::new());
    manager.ieeeps_on().await.unwrap();
    next_event(events).await;

    manager.stop().await.unwrap();
    while let Ok(event) = events.try_receive() {
        println!("Event: {event:?}");
    }
}

fn main() {
    let manager: &'static WlanManager =
        mk_static!(WlanManager, WlanManager::new(WlanConfig::default()));
    let events: &'static EventQueue = mk_static!(EventQueue, Channel::new());
    let mut radio = SimulatedRadio {
        air: vec![
            access_point("HomeNet", 1, 1, -71, true),
            access_point("HomeNet", 2, 11, -52, true),
            access_point("CoffeeShop", 3, 6, -60, false),
        ],
    };

    block_on(async {
        manager
            .init(&mut radio, &FirmwareDescriptor::default())
            .await
            .unwrap();
        println!("MAC address: {}", manager.get_mac_address().unwrap());
        let runner = manager.start(radio, events).unwrap();
        let (mut radio, ()) = join(runner.run(), session(manager, events)).await;
        manager
            .deinit(&mut radio, DeinitAction::PowerDown)
            .await
            .unwrap();
    });
}
