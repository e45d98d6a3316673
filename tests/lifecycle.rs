mod common;

use common::*;
use embassy_futures::{
    block_on,
    join::{join, join3},
};
use wlan_cmgr::*;

fn station(name: &str) -> NetworkProfile {
    NetworkProfile::station(
        name,
        NetworkTarget::Ssid(Ssid::new(name).unwrap()),
        Security::WpaWpa2Mixed(Passphrase::new("open sesame").unwrap()),
    )
    .unwrap()
}

#[test]
fn profile_store() {
    let manager = WlanManager::new(WlanConfig::default());
    assert_eq!(manager.get_network_count(), 0);
    assert_eq!(manager.get_network(0), Err(WlanError::InvalidArgument));

    for name in ["a", "b", "c", "d", "e"] {
        manager.add_network(&station(name)).unwrap();
    }
    assert_eq!(manager.add_network(&station("f")), Err(WlanError::NoMemory));
    assert_eq!(manager.get_network_count(), WLAN_MAX_KNOWN_NETWORKS);

    assert_eq!(manager.get_network(2).unwrap().name.as_str(), "c");
    assert_eq!(manager.get_network_byname("e"), Ok(station("e")));
    assert_eq!(
        manager.get_network_byname("f"),
        Err(WlanError::InvalidArgument)
    );

    block_on(async {
        assert_eq!(
            manager.remove_network("f").await,
            Err(WlanError::InvalidArgument)
        );
        manager.remove_network("c").await.unwrap();
    });
    assert_eq!(manager.get_network_count(), 4);
    assert_eq!(manager.get_network(2).unwrap().name.as_str(), "d");
    manager.add_network(&station("f")).unwrap();
}

#[test]
fn duplicate_and_malformed_profiles() {
    let manager = WlanManager::new(WlanConfig::default());
    manager.add_network(&station("home")).unwrap();
    assert_eq!(
        manager.add_network(&station("home")),
        Err(WlanError::InvalidArgument)
    );
    let mut nameless = station("x");
    nameless.name.clear();
    assert_eq!(
        manager.add_network(&nameless),
        Err(WlanError::InvalidArgument)
    );
    assert_eq!(manager.get_network_count(), 1);
}

#[test]
fn enterprise_only_policy() {
    let manager = WlanManager::new(WlanConfig::default());
    manager.enable_wpa2_enterprise_ap_only();
    assert_eq!(
        manager.add_network(&station("psk")),
        Err(WlanError::InvalidArgument)
    );
    let mut corp = station("corp");
    corp.security = Security::Wpa2Enterprise(EnterpriseIdentity::new("alice").unwrap());
    manager.add_network(&corp).unwrap();
    manager.add_network(&uap_profile()).unwrap();
}

#[test]
fn requests_need_a_running_manager() {
    let manager = WlanManager::new(WlanConfig::default());
    let mut radio = MockRadio::new();
    manager.add_network(&station("home")).unwrap();
    assert_eq!(manager.get_mac_address(), Err(WlanError::StateError));
    assert!(matches!(
        manager.start(radio.clone(), |_: WlanEvent| {}),
        Err(WlanError::StateError)
    ));
    block_on(async {
        assert_eq!(manager.connect("home").await, Err(WlanError::StateError));
        assert_eq!(manager.scan(|_| {}).await, Err(WlanError::StateError));
        assert_eq!(manager.stop().await, Err(WlanError::StateError));

        manager
            .init(&mut radio, &FirmwareDescriptor::default())
            .await
            .unwrap();
        assert_eq!(
            manager
                .init(&mut radio, &FirmwareDescriptor::default())
                .await,
            Err(WlanError::StateError)
        );
    });
    assert_eq!(manager.get_mac_address(), Ok(MAC_ADDRESS));
    assert_eq!(manager.get_connection_state(), Err(WlanError::StateError));
}

#[test]
fn firmware_can_override_mac_address() {
    let manager = WlanManager::new(WlanConfig::default());
    let mut radio = MockRadio::new();
    let mac_address = MacAddress::new([0x02, 0x11, 0x22, 0x33, 0x44, 0x55]);
    block_on(manager.init(
        &mut radio,
        &FirmwareDescriptor {
            mac_address: Some(mac_address),
            ..Default::default()
        },
    ))
    .unwrap();
    assert_eq!(manager.get_mac_address(), Ok(mac_address));
}

#[test]
fn stop_returns_the_radio() {
    let manager = WlanManager::new(WlanConfig::default());
    let mut radio = MockRadio::new();
    radio.script().networks = vec![access_point("HomeNet", 1, -50, wpa2())];
    let events = EventLog::default();
    block_on(async {
        manager
            .init(&mut radio, &FirmwareDescriptor::default())
            .await
            .unwrap();
        manager.add_network(&home_profile()).unwrap();
        manager.add_network(&uap_profile()).unwrap();
        let runner = manager.start(radio.clone(), events.sink()).unwrap();
        let (mut radio, ()) = join(runner.run(), async {
            connect(&manager, &events, "home").await;
            manager.start_network("uap-network").await.unwrap();
            events.wait_for(WlanEvent::UapSuccess).await;
            assert_eq!(
                manager.deinit(&mut MockRadio::new(), DeinitAction::PowerDown).await,
                Err(WlanError::StateError)
            );
            manager.stop().await.unwrap();
        })
        .await;
        assert!(radio.script().stopped);
        assert_eq!(manager.get_connection_state(), Err(WlanError::StateError));
        assert_eq!(manager.connect("home").await, Err(WlanError::StateError));

        manager
            .deinit(&mut radio, DeinitAction::PowerDown)
            .await
            .unwrap();
        assert_eq!(
            radio.script().deinitialized,
            Some(DeinitAction::PowerDown)
        );
    });
    assert_eq!(manager.get_network_count(), 0);
    assert_eq!(manager.get_mac_address(), Err(WlanError::StateError));
    assert_eq!(
        events.events(),
        [
            WlanEvent::Initialized,
            WlanEvent::Success,
            WlanEvent::UapSuccess,
            WlanEvent::UserDisconnect,
            WlanEvent::UapStopped
        ]
    );
}

#[test]
fn restart_after_stop() {
    let manager = WlanManager::new(WlanConfig::default());
    let mut radio = MockRadio::new();
    let events = EventLog::default();
    block_on(async {
        manager
            .init(&mut radio, &FirmwareDescriptor::default())
            .await
            .unwrap();
        for _ in 0..2 {
            let runner = manager.start(radio.clone(), events.sink()).unwrap();
            join(runner.run(), async {
                settle().await;
                manager.stop().await.unwrap();
            })
            .await;
        }
    });
    assert_eq!(
        events.events(),
        [WlanEvent::Initialized, WlanEvent::Initialized]
    );
}

#[test]
fn failed_radio_start_is_reported() {
    let manager = WlanManager::new(WlanConfig::default());
    let mut radio = MockRadio::new();
    radio.script().start_result = Err(RadioError::Failed);
    let events = EventLog::default();
    block_on(async {
        manager
            .init(&mut radio, &FirmwareDescriptor::default())
            .await
            .unwrap();
        let runner = manager.start(radio.clone(), events.sink()).unwrap();
        runner.run().await;
    });
    assert_eq!(events.events(), [WlanEvent::InitializationFailed]);
    assert_eq!(manager.get_connection_state(), Err(WlanError::StateError));
}

#[test]
fn requests_queued_behind_stop_fail() {
    let manager = WlanManager::new(WlanConfig::default());
    let mut radio = MockRadio::new();
    let events = EventLog::default();
    block_on(async {
        manager
            .init(&mut radio, &FirmwareDescriptor::default())
            .await
            .unwrap();
        manager.add_network(&home_profile()).unwrap();
        manager.add_network(&uap_profile()).unwrap();
        let runner = manager.start(radio.clone(), events.sink()).unwrap();
        join(runner.run(), async {
            let (stopped, connected, started) = join3(
                manager.stop(),
                manager.connect("home"),
                manager.start_network("uap-network"),
            )
            .await;
            stopped.unwrap();
            connected.unwrap();
            started.unwrap();
        })
        .await;
    });
    assert!(radio.script().associations.is_empty());
    assert_eq!(radio.script().uap_channel, None);
    assert_eq!(
        events.events(),
        [
            WlanEvent::Initialized,
            WlanEvent::ConnectFailed,
            WlanEvent::UapStartFailed
        ]
    );
}
