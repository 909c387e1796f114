//! Integration-Tests fuer RealtimeChat (Attrappen statt Netz und Mikrofon)

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::*;
use esquads_core::SpeakingChange;
use esquads_realtime::{ChatState, RealtimeConfig, RealtimeError};

#[tokio::test]
async fn disconnect_vor_init_ist_harmlos() {
    let mut a = aufbau(FakeBroker::mit_key("ek_test"), FakeSdp::ok());
    a.chat.disconnect().await;
    a.chat.disconnect().await;
    assert_eq!(a.chat.state(), ChatState::Closed);
    assert_eq!(a.mikrofon.starts(), 0);
}

#[tokio::test]
async fn nachricht_ohne_kanal_wird_abgelehnt() {
    let a = aufbau(FakeBroker::mit_key("ek_test"), FakeSdp::ok());
    let result = a.chat.send_message("Hallo").await;
    assert!(matches!(result, Err(RealtimeError::KanalNichtOffen)));
}

#[tokio::test]
async fn fehlender_ephemeral_key() {
    let mut a = aufbau(FakeBroker::ohne_secret(), FakeSdp::ok());

    let err = a.chat.init().await.expect_err("init muss scheitern");
    assert!(matches!(err, RealtimeError::FehlenderEphemeralKey));
    assert!(err.to_string().contains("Ephemeral Key"));

    assert_eq!(a.chat.state(), ChatState::Idle);
    assert_eq!(a.connector.verbindungen.load(Ordering::SeqCst), 0);
    assert_eq!(a.sdp.aufrufe.load(Ordering::SeqCst), 0);
    assert_eq!(a.mikrofon.starts(), 0);
}

#[tokio::test]
async fn sdp_fehler_startet_kein_mikrofon() {
    let mut a = aufbau(FakeBroker::mit_key("ek_test"), FakeSdp::scheitert(1));

    let err = a.chat.init().await.expect_err("init muss scheitern");
    assert!(matches!(err, RealtimeError::Handshake { status: 500, .. }));

    assert_eq!(a.mikrofon.starts(), 0);
    assert_eq!(a.transport.schliessungen.load(Ordering::SeqCst), 1);
    assert_eq!(a.chat.state(), ChatState::Idle);
    assert!(a.chat.session_id().is_none());
}

#[tokio::test]
async fn ephemeral_key_geht_an_sdp_austausch() {
    let mut a = aufbau(FakeBroker::mit_key("ek_abc"), FakeSdp::ok());
    a.chat.init().await.expect("init");

    assert_eq!(a.sdp.letzter_key.lock().as_deref(), Some("ek_abc"));
    assert_eq!(a.transport.answer.lock().as_deref(), Some("v=0\r\nanswer"));
    assert_eq!(a.chat.session_id().map(|s| s.as_str()), Some("sess_test"));
    assert_eq!(a.chat.state(), ChatState::Connected);
    assert_eq!(a.mikrofon.starts(), 1);
}

#[tokio::test(start_paused = true)]
async fn broker_zeitlimit() {
    let mut a = aufbau(FakeBroker::haengend(), FakeSdp::ok());

    let err = a.chat.init().await.expect_err("init muss scheitern");
    assert!(matches!(err, RealtimeError::Zeitlimit(_)));
    assert_eq!(a.chat.state(), ChatState::Idle);
    assert_eq!(a.connector.verbindungen.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn offer_zeitlimit_rollt_zurueck() {
    let mut a = aufbau(FakeBroker::mit_key("ek_test"), FakeSdp::ok());
    a.transport.offer_haengt.store(true, Ordering::SeqCst);

    let err = a.chat.init().await.expect_err("init muss scheitern");
    assert!(matches!(err, RealtimeError::Zeitlimit("SDP-Offer")));
    assert_eq!(a.transport.schliessungen.load(Ordering::SeqCst), 1);
    assert_eq!(a.sdp.aufrufe.load(Ordering::SeqCst), 0);
    assert_eq!(a.mikrofon.starts(), 0);
    assert_eq!(a.chat.state(), ChatState::Idle);
}

#[tokio::test(start_paused = true)]
async fn sdp_zeitlimit_rollt_zurueck() {
    let mut a = aufbau(FakeBroker::mit_key("ek_test"), FakeSdp::haengend());

    let err = a.chat.init().await.expect_err("init muss scheitern");
    assert!(matches!(err, RealtimeError::Zeitlimit("SDP-Austausch")));
    assert_eq!(a.transport.schliessungen.load(Ordering::SeqCst), 1);
    assert!(a.transport.answer.lock().is_none());
    assert_eq!(a.mikrofon.starts(), 0);
    assert_eq!(a.chat.state(), ChatState::Idle);
    assert!(a.chat.session_id().is_none());
}

#[tokio::test]
async fn langsames_mikrofon_blockiert_die_laufzeit_nicht() {
    let mut a = aufbau_mit_recorder(
        RealtimeConfig::default(),
        FakeBroker::mit_key("ek_test"),
        FakeSdp::ok(),
        |sonde| FakeRecorder::langsam(sonde, Duration::from_millis(300)),
    );

    let ticks = Arc::new(AtomicUsize::new(0));
    let zaehler = Arc::clone(&ticks);
    let ticker = tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(10)).await;
            zaehler.fetch_add(1, Ordering::SeqCst);
        }
    });

    a.chat.init().await.expect("init");
    ticker.abort();

    assert_eq!(a.mikrofon.starts(), 1);
    let n = ticks.load(Ordering::SeqCst);
    assert!(n >= 5, "Laufzeit war waehrend des Mikrofon-Starts blockiert ({n} Ticks)");
}

#[tokio::test]
async fn drop_ohne_disconnect_raeumt_im_hintergrund_auf() {
    let mut a = aufbau(FakeBroker::mit_key("ek_test"), FakeSdp::ok());
    a.chat.init().await.expect("init");

    let Aufbau {
        chat,
        transport,
        mikrofon,
        ..
    } = a;
    drop(chat);

    assert!(warten_bis(|| transport.schliessungen.load(Ordering::SeqCst) == 1).await);
    assert_eq!(mikrofon.stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn erneuter_versuch_nach_fehler() {
    let mut a = aufbau(FakeBroker::mit_key("ek_test"), FakeSdp::scheitert(1));

    assert!(a.chat.init().await.is_err());
    assert_eq!(a.chat.state(), ChatState::Idle);

    a.chat.init().await.expect("zweiter Versuch");
    assert_eq!(a.chat.state(), ChatState::Connected);
    assert_eq!(a.broker.aufrufe.load(Ordering::SeqCst), 2);
    assert_eq!(a.mikrofon.starts(), 1);
}

#[tokio::test]
async fn init_nur_aus_idle() {
    let mut a = aufbau(FakeBroker::mit_key("ek_test"), FakeSdp::ok());
    a.chat.init().await.expect("init");

    let err = a.chat.init().await.expect_err("zweites init");
    assert!(matches!(
        err,
        RealtimeError::UngueltigerZustand {
            aktuell: "Connected",
            ..
        }
    ));
    assert_eq!(a.connector.verbindungen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn mikrofon_fehler_rollt_zurueck() {
    let mut a = aufbau_mit(
        RealtimeConfig::default(),
        FakeBroker::mit_key("ek_test"),
        FakeSdp::ok(),
        true,
    );

    let err = a.chat.init().await.expect_err("init muss scheitern");
    assert!(matches!(err, RealtimeError::Audio(_)));
    assert_eq!(a.transport.schliessungen.load(Ordering::SeqCst), 1);
    assert_eq!(a.chat.state(), ChatState::Idle);
}

#[tokio::test]
async fn frames_vor_dem_oeffnen_werden_gepuffert() {
    let mut a = aufbau(FakeBroker::mit_key("ek_test"), FakeSdp::ok());
    a.chat.init().await.expect("init");

    // 6 Frames bei Kapazitaet 4: die beiden aeltesten fallen weg
    for i in 0..6 {
        a.mikrofon.frame(i as f32 / 10.0);
    }
    abarbeiten().await;
    assert!(a.transport.gesendet.lock().is_empty());

    a.transport.oeffnen();
    abarbeiten().await;
    a.mikrofon.frame(0.6);
    abarbeiten().await;

    let events = a.transport.gesendete_events();
    assert_eq!(events.len(), 5);
    assert!(events
        .iter()
        .all(|e| e["type"] == "input_audio_buffer.append"));

    let erste: Vec<i16> = events.iter().map(erster_sample).collect();
    let erwartet: Vec<i16> = [0.2f32, 0.3, 0.4, 0.5, 0.6]
        .iter()
        .map(|v| esquads_audio::float_to_pcm16(&[*v])[0])
        .collect();
    assert_eq!(erste, erwartet);
}

#[tokio::test]
async fn ohne_puffer_werden_fruehe_frames_verworfen() {
    let config = RealtimeConfig {
        frame_puffer: 0,
        ..Default::default()
    };
    let mut a = aufbau_mit(config, FakeBroker::mit_key("ek_test"), FakeSdp::ok(), false);
    a.chat.init().await.expect("init");

    a.mikrofon.frame(0.1);
    a.mikrofon.frame(0.2);
    abarbeiten().await;
    a.transport.oeffnen();
    abarbeiten().await;
    a.mikrofon.frame(0.3);
    abarbeiten().await;

    let events = a.transport.gesendete_events();
    assert_eq!(events.len(), 1);
    assert_eq!(erster_sample(&events[0]), esquads_audio::float_to_pcm16(&[0.3])[0]);
}

#[tokio::test]
async fn textnachricht_sendet_zwei_events() {
    let mut a = aufbau(FakeBroker::mit_key("ek_test"), FakeSdp::ok());
    a.chat.init().await.expect("init");
    a.transport.oeffnen();

    a.chat.send_message("Was ist Rust?").await.expect("senden");

    let events = a.transport.gesendete_events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["type"], "conversation.item.create");
    assert_eq!(events[0]["item"]["role"], "user");
    assert_eq!(events[0]["item"]["content"][0]["type"], "input_text");
    assert_eq!(events[0]["item"]["content"][0]["text"], "Was ist Rust?");
    assert_eq!(events[1], serde_json::json!({"type": "response.create"}));
}

#[tokio::test]
async fn eingehende_events_werden_weitergereicht() {
    let mut a = aufbau(FakeBroker::mit_key("ek_test"), FakeSdp::ok());
    a.chat.init().await.expect("init");

    assert!(!a.transport.eingehend(b"<<kein json>>"));
    assert!(a.transport.eingehend(br#"{"type":"response.audio.delta","delta":"AAAA"}"#));
    assert!(a.transport.eingehend(br#"{"type":"response.audio.done"}"#));

    let events = a.events.lock();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].speaking_change(), Some(SpeakingChange::Started));
    assert_eq!(events[1].speaking_change(), Some(SpeakingChange::Stopped));
}

#[tokio::test]
async fn disconnect_gibt_alles_frei() {
    let mut a = aufbau(FakeBroker::mit_key("ek_test"), FakeSdp::ok());
    a.chat.init().await.expect("init");
    a.transport.oeffnen();

    a.chat.disconnect().await;
    assert_eq!(a.chat.state(), ChatState::Closed);
    assert_eq!(a.mikrofon.stops.load(Ordering::SeqCst), 1);
    assert_eq!(a.transport.schliessungen.load(Ordering::SeqCst), 1);

    assert!(matches!(
        a.chat.send_message("noch da?").await,
        Err(RealtimeError::KanalNichtOffen)
    ));
    assert!(matches!(
        a.chat.init().await,
        Err(RealtimeError::UngueltigerZustand { .. })
    ));

    a.chat.disconnect().await;
    assert_eq!(a.transport.schliessungen.load(Ordering::SeqCst), 1);
}
