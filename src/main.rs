use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use futures::stream::{self, Stream, StreamExt};
use log::{info, warn};
use tokio::sync::mpsc;

use muse_decode::prelude::*;

/// Replay a recorded Muse notification log through the decoder and print
/// time-aligned EEG (and optionally PPG) rows.
///
/// Log format, one notification per line:
///
///   <channel> <hex bytes>
///
/// where <channel> is eeg0..eeg4, ppg0..ppg2, telemetry, accel, gyro,
/// control, or a characteristic UUID. `marker <value>` injects an event
/// marker. Blank lines and lines starting with '#' are skipped.
#[derive(Debug, Parser)]
#[command(name = "muse-replay", version)]
struct Args {
    /// Path to the notification log.
    log: PathBuf,

    /// Decode the AUX (5th) EEG electrode.
    #[arg(long)]
    aux: bool,

    /// Decode the three PPG channels.
    #[arg(long)]
    ppg: bool,
}

fn receiver_stream<T>(rx: mpsc::Receiver<T>) -> impl Stream<Item = T> {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) })
}

fn print_row<const N: usize>(group: &str, names: &[&str; N], row: &AlignedRow<N>) {
    let cols: Vec<String> = names
        .iter()
        .zip(row.data)
        .map(|(name, v)| format!("{name}={v:+9.3}"))
        .collect();
    println!(
        "[{group}] idx={:5}  ts={:.3} ms  {}",
        row.index,
        row.timestamp,
        cols.join("  ")
    );
}

fn print_event(event: &MuseEvent) {
    match event {
        MuseEvent::Telemetry(t) => println!(
            "[TELEMETRY] seq={:5}  battery={:.1}%  fuel_gauge={:.1} mV  temp={}",
            t.sequence_id, t.battery_level, t.fuel_gauge_voltage, t.temperature
        ),
        MuseEvent::Accelerometer(a) => {
            let s = &a.samples[0];
            println!(
                "[ACCEL] seq={:5}  x={:+.5}g  y={:+.5}g  z={:+.5}g",
                a.sequence_id, s.x, s.y, s.z
            );
        }
        MuseEvent::Gyroscope(g) => {
            let s = &g.samples[0];
            println!(
                "[GYRO]  seq={:5}  x={:+.5}°/s  y={:+.5}°/s  z={:+.5}°/s",
                g.sequence_id, s.x, s.y, s.z
            );
        }
        MuseEvent::Control(resp) => match resp.device_info() {
            Some(info) => println!("[DEVICE INFO] fw={} hw={} | {}", info.fw, info.hw, resp.raw),
            None => println!("[CONTROL] {}", resp.raw),
        },
        MuseEvent::Marker(m) => println!("[MARKER] ts={:.0} ms  value={}", m.timestamp, m.value),
        // EEG and PPG readings are routed to their zipping pipelines.
        MuseEvent::Eeg(_) | MuseEvent::Ppg(_) => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── Logging ───────────────────────────────────────────────────────────────
    // Set RUST_LOG=debug for verbose output, e.g.:
    //   RUST_LOG=muse_decode=debug muse-replay capture.log
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let text = tokio::fs::read_to_string(&args.log)
        .await
        .with_context(|| format!("reading {}", args.log.display()))?;

    let mut session = Session::new(SessionConfig {
        enable_aux: args.aux,
        enable_ppg: args.ppg,
    });

    // ── Pipelines ─────────────────────────────────────────────────────────────
    // Each channel group owns its zipper and runs on its own task.
    let (eeg_tx, eeg_rx) = mpsc::channel::<EegReading>(256);
    let (ppg_tx, ppg_rx) = mpsc::channel::<PpgReading>(256);

    let eeg_task = tokio::spawn(async move {
        let mut rows = Box::pin(zip_stream(receiver_stream(eeg_rx), SampleZipper::eeg()));
        let mut count = 0usize;
        while let Some(row) = rows.next().await {
            print_row("EEG", &EEG_CHANNEL_NAMES, &row);
            count += 1;
        }
        count
    });

    let ppg_task = tokio::spawn(async move {
        let mut rows = Box::pin(zip_stream(receiver_stream(ppg_rx), SampleZipper::ppg()));
        let mut count = 0usize;
        while let Some(row) = rows.next().await {
            print_row("PPG", &PPG_CHANNEL_NAMES, &row);
            count += 1;
        }
        count
    });

    // ── Replay ────────────────────────────────────────────────────────────────
    info!("Replaying {} …", args.log.display());
    let mut notifications = 0usize;
    for (lineno, line) in text.lines().enumerate() {
        let lineno = lineno + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (tag, payload) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let payload = payload.trim();

        if tag == "marker" {
            let value = payload
                .parse::<f64>()
                .map(ControlValue::Number)
                .unwrap_or_else(|_| ControlValue::from(payload));
            print_event(&session.inject_marker(value, None));
            continue;
        }

        let channel: Channel = match tag.parse() {
            Ok(c) => c,
            Err(e) => {
                warn!("line {lineno}: {e}");
                continue;
            }
        };
        let data = match hex::decode(payload.replace(' ', "")) {
            Ok(d) => d,
            Err(e) => {
                warn!("line {lineno}: bad hex payload: {e}");
                continue;
            }
        };
        notifications += 1;

        for event in session.handle(channel, &data) {
            match event {
                Ok(MuseEvent::Eeg(reading)) => eeg_tx
                    .send(reading)
                    .await
                    .context("EEG pipeline stopped")?,
                Ok(MuseEvent::Ppg(reading)) => ppg_tx
                    .send(reading)
                    .await
                    .context("PPG pipeline stopped")?,
                Ok(other) => print_event(&other),
                Err(e) => warn!("line {lineno}: {e}"),
            }
        }
    }

    // Closing the senders ends the streams and flushes the last batches.
    drop(eeg_tx);
    drop(ppg_tx);
    let eeg_rows = eeg_task.await?;
    let ppg_rows = ppg_task.await?;

    info!(
        "Replay finished: {notifications} notifications, {eeg_rows} EEG rows, {ppg_rows} PPG rows."
    );
    Ok(())
}
