mod common;

use common::*;
use embassy_futures::{block_on, join::join};
use wlan_cmgr::*;

fn connected_radio() -> MockRadio {
    let radio = MockRadio::new();
    radio.script().networks = vec![access_point("HomeNet", 1, -50, wpa2())];
    radio
}

#[test]
fn ieee_power_save() {
    let manager = WlanManager::new(WlanConfig::default());
    let radio = connected_radio();
    let events = EventLog::default();
    let config = IeeePsConfig {
        listen_interval: 10,
        ..IeeePsConfig::new()
    };
    block_on(with_runner(&manager, &radio, &events, async {
        manager.add_network(&home_profile()).unwrap();
        assert_eq!(manager.ieeeps_on().await, Err(WlanError::StateError));
        assert_eq!(manager.ieeeps_off().await, Err(WlanError::StateError));

        connect(&manager, &events, "home").await;
        manager.configure_ieee_ps(config);
        manager.ieeeps_on().await.unwrap();
        events.wait_for(WlanEvent::PsEnter(PowerSaveKind::Ieee)).await;
        assert_eq!(manager.get_ps_mode(), PsMode::Ieee);
        assert_eq!(manager.ieeeps_on().await, Err(WlanError::StateError));
        assert_eq!(manager.scan(|_| {}).await, Err(WlanError::StateError));

        manager.ieeeps_off().await.unwrap();
        events.wait_for(WlanEvent::PsExit(PowerSaveKind::Ieee)).await;
        assert_eq!(manager.get_ps_mode(), PsMode::Active);
        manager.scan(|_| {}).await.unwrap();
    }));
    assert_eq!(
        radio.script().power_save,
        [
            PowerSaveRequest::EnterIeee(config),
            PowerSaveRequest::ExitIeee
        ]
    );
}

#[test]
fn link_loss_leaves_ieee_power_save() {
    let manager = WlanManager::new(WlanConfig::default());
    let radio = connected_radio();
    let events = EventLog::default();
    block_on(with_runner(&manager, &radio, &events, async {
        manager.add_network(&home_profile()).unwrap();
        connect(&manager, &events, "home").await;
        manager.ieeeps_on().await.unwrap();
        events.wait_for(WlanEvent::PsEnter(PowerSaveKind::Ieee)).await;
        manager.radio_events().send(RadioEvent::LinkLost).await;
        events.wait_for(WlanEvent::PsExit(PowerSaveKind::Ieee)).await;
        assert_eq!(manager.get_ps_mode(), PsMode::Active);
    }));
    assert_eq!(
        events.events(),
        [
            WlanEvent::Initialized,
            WlanEvent::Success,
            WlanEvent::PsEnter(PowerSaveKind::Ieee),
            WlanEvent::LinkLost,
            WlanEvent::PsExit(PowerSaveKind::Ieee)
        ]
    );
}

#[test]
fn disconnect_leaves_ieee_power_save() {
    let manager = WlanManager::new(WlanConfig::default());
    let radio = connected_radio();
    let events = EventLog::default();
    block_on(with_runner(&manager, &radio, &events, async {
        manager.add_network(&home_profile()).unwrap();
        connect(&manager, &events, "home").await;
        manager.ieeeps_on().await.unwrap();
        events.wait_for(WlanEvent::PsEnter(PowerSaveKind::Ieee)).await;
        events.clear();
        manager.disconnect().await.unwrap();
        events.wait_for(WlanEvent::PsExit(PowerSaveKind::Ieee)).await;
    }));
    assert_eq!(
        events.events(),
        [
            WlanEvent::UserDisconnect,
            WlanEvent::PsExit(PowerSaveKind::Ieee)
        ]
    );
    assert_eq!(
        radio.script().power_save.last(),
        Some(&PowerSaveRequest::ExitIeee)
    );
}

#[test]
fn deep_sleep_blocks_the_station() {
    let manager = WlanManager::new(WlanConfig::default());
    let radio = connected_radio();
    let events = EventLog::default();
    block_on(with_runner(&manager, &radio, &events, async {
        manager.add_network(&home_profile()).unwrap();
        manager.add_network(&uap_profile()).unwrap();
        connect(&manager, &events, "home").await;
        assert_eq!(manager.deepsleepps_on().await, Err(WlanError::StateError));
        manager.disconnect().await.unwrap();
        events.wait_for(WlanEvent::UserDisconnect).await;

        manager.deepsleepps_on().await.unwrap();
        events
            .wait_for(WlanEvent::PsEnter(PowerSaveKind::DeepSleep))
            .await;
        assert_eq!(manager.get_ps_mode(), PsMode::DeepSleep);
        assert_eq!(manager.connect("home").await, Err(WlanError::StateError));
        assert_eq!(
            manager.start_network("uap-network").await,
            Err(WlanError::StateError)
        );
        assert_eq!(manager.scan(|_| {}).await, Err(WlanError::StateError));
        assert_eq!(manager.pdnps_on().await, Err(WlanError::StateError));
        assert_eq!(manager.pdnps_off().await, Err(WlanError::StateError));

        manager.deepsleepps_off().await.unwrap();
        events
            .wait_for(WlanEvent::PsExit(PowerSaveKind::DeepSleep))
            .await;
        assert_eq!(connect(&manager, &events, "home").await, WlanEvent::Success);
    }));
    assert_eq!(
        radio.script().power_save,
        [
            PowerSaveRequest::EnterDeepSleep,
            PowerSaveRequest::ExitDeepSleep
        ]
    );
}

#[test]
fn stop_powers_the_radio_up() {
    let manager = WlanManager::new(WlanConfig::default());
    let mut radio = MockRadio::new();
    let events = EventLog::default();
    block_on(async {
        manager
            .init(&mut radio, &FirmwareDescriptor::default())
            .await
            .unwrap();
        let runner = manager.start(radio.clone(), events.sink()).unwrap();
        join(runner.run(), async {
            manager.pdnps_on().await.unwrap();
            events
                .wait_for(WlanEvent::PsEnter(PowerSaveKind::PowerDown))
                .await;
            manager.stop().await.unwrap();
        })
        .await;
    });
    assert_eq!(
        radio.script().power_save,
        [PowerSaveRequest::PowerDown, PowerSaveRequest::PowerUp]
    );
    assert_eq!(manager.get_ps_mode(), PsMode::Active);
}

#[test]
fn uap_power_save() {
    let manager = WlanManager::new(WlanConfig::default());
    let radio = MockRadio::new();
    let events = EventLog::default();
    let inactivity = InactivitySleepParams {
        protection_frames: true,
        max_sleep: 30000,
        ..InactivitySleepParams::new()
    };
    block_on(with_runner(&manager, &radio, &events, async {
        assert_eq!(
            manager.uap_ps_on(UapPsConfig::DtimSleep).await,
            Err(WlanError::StateError)
        );
        manager.add_network(&uap_profile()).unwrap();
        manager.start_network("uap-network").await.unwrap();
        events.wait_for(WlanEvent::UapSuccess).await;

        for params in [
            InactivitySleepParams {
                min_sleep: 1000,
                ..inactivity
            },
            InactivitySleepParams {
                max_sleep: 40000,
                ..inactivity
            },
            InactivitySleepParams {
                inactivity_timeout: 0,
                ..inactivity
            },
        ] {
            assert_eq!(
                manager
                    .uap_ps_on(UapPsConfig::InactivitySleep(params))
                    .await,
                Err(WlanError::InvalidArgument)
            );
        }

        manager
            .uap_ps_on(UapPsConfig::InactivitySleep(inactivity))
            .await
            .unwrap();
        events
            .wait_for(WlanEvent::PsEnter(PowerSaveKind::UapInactivitySleep))
            .await;
        assert_eq!(manager.get_uap_ps_mode(), UapPsMode::InactivitySleep);
        assert_eq!(
            manager.uap_ps_on(UapPsConfig::DtimSleep).await,
            Err(WlanError::StateError)
        );
        assert_eq!(
            manager.stop_network("uap-network").await,
            Err(WlanError::StateError)
        );

        manager.uap_ps_off().await.unwrap();
        events
            .wait_for(WlanEvent::PsExit(PowerSaveKind::UapInactivitySleep))
            .await;
        assert_eq!(manager.get_uap_ps_mode(), UapPsMode::Active);
        manager.stop_network("uap-network").await.unwrap();
        events.wait_for(WlanEvent::UapStopped).await;
    }));
    assert_eq!(
        radio.script().power_save,
        [
            PowerSaveRequest::EnterUap(UapPsConfig::InactivitySleep(inactivity)),
            PowerSaveRequest::ExitUap
        ]
    );
}

#[test]
fn radio_failure_keeps_the_mode() {
    let manager = WlanManager::new(WlanConfig::default());
    let radio = connected_radio();
    radio.script().power_save_result = Err(RadioError::Failed);
    let events = EventLog::default();
    block_on(with_runner(&manager, &radio, &events, async {
        manager.add_network(&home_profile()).unwrap();
        connect(&manager, &events, "home").await;
        manager.ieeeps_on().await.unwrap();
        settle_until(|| !radio.script().power_save.is_empty()).await;
        settle().await;
        assert_eq!(manager.get_ps_mode(), PsMode::Active);
    }));
    assert_eq!(events.events(), [WlanEvent::Initialized, WlanEvent::Success]);
}
