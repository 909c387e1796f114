//! Esquads Client – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet eine
//! Realtime-Sprachsession. Jede Zeile auf stdin wird als Textnachricht
//! gesendet; EOF oder Ctrl-C beendet die Session.
//!
//! `esquads-client --geraete` listet die Audio-Geraete auf.

use anyhow::{Context, Result};
use esquads_client::config::ENV_CONFIG;
use esquads_client::{ClientConfig, SprechAnzeige};
use esquads_observability::logging_initialisieren;
use esquads_realtime::RealtimeChat;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<()> {
    let config_pfad = std::env::var(ENV_CONFIG).unwrap_or_else(|_| "esquads.toml".into());

    let mut config = ClientConfig::laden(&config_pfad)?;
    config.geheimnisse_aus_env();

    logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Esquads Client wird initialisiert"
    );

    if std::env::args().skip(1).any(|a| a == "--geraete") {
        return geraete_auflisten();
    }

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut chat = RealtimeChat::new(config.realtime, move |event| {
        let _ = event_tx.send(event);
    })?;

    println!("Zustand: {}", chat.state());
    chat.init()
        .await
        .context("Realtime-Session konnte nicht gestartet werden")?;
    println!("Zustand: {}", chat.state());

    let mut zeilen = BufReader::new(tokio::io::stdin()).lines();
    let mut anzeige = SprechAnzeige::default();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            zeile = zeilen.next_line() => {
                let Some(zeile) = zeile? else { break };
                let text = zeile.trim();
                if text.is_empty() {
                    continue;
                }
                if let Err(e) = chat.send_message(text).await {
                    eprintln!("Nachricht nicht gesendet: {e}");
                }
            }
            Some(event) = event_rx.recv() => {
                if let Some(zeile) = anzeige.verarbeiten(&event) {
                    println!("{zeile}");
                }
            }
        }
    }

    chat.disconnect().await;
    println!("Zustand: {}", chat.state());
    Ok(())
}

fn geraete_auflisten() -> Result<()> {
    for (titel, geraete) in [
        ("Eingabe", esquads_audio::list_input_devices()?),
        ("Ausgabe", esquads_audio::list_output_devices()?),
    ] {
        println!("{titel}:");
        for g in geraete {
            let standard = if g.is_default { " (Standard)" } else { "" };
            println!("  {}{}, max. {} Kanaele", g.name, standard, g.max_channels);
        }
    }
    Ok(())
}
