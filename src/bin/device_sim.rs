//! Standalone device simulator.
//!
//! Connects simulated vehicle locks and slot LED controllers to the
//! device gateway so the service can be exercised end to end without
//! hardware: answers Unlock / Lock / SetLedColor commands and streams
//! randomized battery, position and occupancy telemetry.
//!
//! ```text
//! device-sim [--url ws://127.0.0.1:9000] [--vehicles 6] [--slots 4]
//!            [--interval 15] [--fail-rate 0.0]
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde_json::{json, Value};
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use texnouz_mobility::application::gateway::DeviceFrame;

/// Around Amir Temur Square, same neighbourhood the demo fleet is
/// seeded in.
const BASE_LATITUDE: f64 = 41.3111;
const BASE_LONGITUDE: f64 = 69.2797;

#[derive(Debug, Clone)]
struct SimOptions {
    url: String,
    vehicles: u32,
    slots: u32,
    interval: Duration,
    fail_rate: f64,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:9000".to_string(),
            vehicles: 6,
            slots: 4,
            interval: Duration::from_secs(15),
            fail_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceKind {
    Vehicle,
    SlotController,
}

/// One simulated device: a vehicle lock unit or a slot LED controller.
struct SimDevice {
    kind: DeviceKind,
    device_id: String,
    battery: u8,
    latitude: f64,
    longitude: f64,
    in_ride: bool,
    /// Occupancy belief, derived from the LED color the service last
    /// set. None until the first SetLedColor arrives, so a freshly
    /// connected controller never contradicts state it has not seen.
    occupied: Option<bool>,
    message_counter: u64,
}

impl SimDevice {
    fn new(kind: DeviceKind, device_id: String) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            kind,
            device_id,
            battery: rng.gen_range(55..=100),
            latitude: BASE_LATITUDE + rng.gen_range(-0.01..0.01),
            longitude: BASE_LONGITUDE + rng.gen_range(-0.01..0.01),
            in_ride: false,
            occupied: None,
            message_counter: 0,
        }
    }

    fn next_message_id(&mut self) -> String {
        self.message_counter += 1;
        format!("{}-{}", self.device_id, self.message_counter)
    }

    /// React to a frame from the service. Returns the reply to send,
    /// if any.
    fn handle_frame(&mut self, text: &str, fail_rate: f64) -> Option<String> {
        match DeviceFrame::parse(text) {
            Ok(DeviceFrame::Call {
                unique_id,
                action,
                payload,
            }) => Some(self.answer_call(&unique_id, &action, &payload, fail_rate)),
            Ok(DeviceFrame::CallResult { .. }) => {
                debug!("[{}] report acknowledged", self.device_id);
                None
            }
            Ok(DeviceFrame::CallError {
                error_code,
                error_description,
                ..
            }) => {
                warn!(
                    "[{}] report refused: {}: {}",
                    self.device_id, error_code, error_description
                );
                None
            }
            Err(e) => {
                warn!("[{}] unparseable frame: {}", self.device_id, e);
                None
            }
        }
    }

    fn answer_call(
        &mut self,
        unique_id: &str,
        action: &str,
        payload: &Value,
        fail_rate: f64,
    ) -> String {
        let supported = matches!(
            (self.kind, action),
            (DeviceKind::Vehicle, "Unlock" | "Lock")
                | (DeviceKind::SlotController, "SetLedColor")
        );
        if !supported {
            warn!("[{}] unsupported action: {}", self.device_id, action);
            return DeviceFrame::CallError {
                unique_id: unique_id.to_string(),
                error_code: "NotImplemented".to_string(),
                error_description: format!("Unknown action: {action}"),
                error_details: json!({}),
            }
            .serialize();
        }

        if rand::thread_rng().gen_bool(fail_rate) {
            info!("[{}] ⚠️ {} -> Rejected (simulated)", self.device_id, action);
            return DeviceFrame::CallResult {
                unique_id: unique_id.to_string(),
                payload: json!({ "status": "Rejected", "reason": "simulated failure" }),
            }
            .serialize();
        }

        match (self.kind, action) {
            (DeviceKind::Vehicle, "Unlock") => {
                self.in_ride = true;
                let ride_id = payload
                    .get("rideId")
                    .and_then(|v| v.as_str())
                    .unwrap_or("-");
                info!("[{}] 🔓 unlocked for ride {}", self.device_id, ride_id);
            }
            (DeviceKind::Vehicle, "Lock") => {
                self.in_ride = false;
                info!("[{}] 🔒 locked", self.device_id);
            }
            (DeviceKind::SlotController, "SetLedColor") => {
                let color = payload.get("color").and_then(|v| v.as_str()).unwrap_or("");
                // The LED mirrors slot state, so the controller's
                // sensor belief follows it. Yellow is maintenance:
                // readings are suppressed until a Green or Red shows.
                self.occupied = match color {
                    "Red" => Some(true),
                    "Green" | "Blue" => Some(false),
                    _ => None,
                };
                info!("[{}] 💡 LED set to {}", self.device_id, color);
            }
            _ => {}
        }

        DeviceFrame::CallResult {
            unique_id: unique_id.to_string(),
            payload: json!({ "status": "Accepted" }),
        }
        .serialize()
    }

    /// Produce the next telemetry call, if the device has anything to
    /// say.
    fn next_report(&mut self) -> Option<DeviceFrame> {
        match self.kind {
            DeviceKind::Vehicle => {
                let mut rng = rand::thread_rng();
                // Drift further while a ride is in progress.
                let spread = if self.in_ride { 0.004 } else { 0.0004 };
                self.latitude += rng.gen_range(-spread..spread);
                self.longitude += rng.gen_range(-spread..spread);

                let drain = if self.in_ride {
                    rng.gen_range(1..=3)
                } else {
                    rng.gen_range(0..=1)
                };
                self.battery = self.battery.saturating_sub(drain);
                if self.battery == 0 {
                    // Battery swap, keeps a long-running demo alive.
                    self.battery = rng.gen_range(80..=100);
                }

                let unique_id = self.next_message_id();
                if rng.gen_bool(0.5) {
                    Some(DeviceFrame::Call {
                        unique_id,
                        action: "BatteryReport".to_string(),
                        payload: json!({ "percentage": self.battery }),
                    })
                } else {
                    Some(DeviceFrame::Call {
                        unique_id,
                        action: "PositionReport".to_string(),
                        payload: json!({
                            "latitude": self.latitude,
                            "longitude": self.longitude,
                        }),
                    })
                }
            }
            DeviceKind::SlotController => {
                // Nothing to affirm until the service has set a color.
                let occupied = self.occupied?;
                let unique_id = self.next_message_id();
                Some(DeviceFrame::Call {
                    unique_id,
                    action: "SlotOccupancyReport".to_string(),
                    payload: json!({ "occupied": occupied }),
                })
            }
        }
    }
}

/// Keep one device connected, reconnecting after transport errors.
async fn run_device(kind: DeviceKind, device_id: String, opts: SimOptions) {
    let mut device = SimDevice::new(kind, device_id);
    loop {
        match run_session(&mut device, &opts).await {
            Ok(()) => {
                info!("[{}] connection closed by the service", device.device_id);
                break;
            }
            Err(e) => {
                warn!(
                    "[{}] session error: {}. Reconnecting in 5s",
                    device.device_id, e
                );
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

async fn run_session(
    device: &mut SimDevice,
    opts: &SimOptions,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let url = format!("{}/{}", opts.url.trim_end_matches('/'), device.device_id);
    let (stream, _) = connect_async(&url).await?;
    info!("[{}] connected to {}", device.device_id, url);

    let (mut sink, mut source) = stream.split();

    // Stagger reports so devices do not tick in lockstep.
    let period = opts.interval.mul_f64(rand::thread_rng().gen_range(0.75..1.25));
    let mut report = tokio::time::interval(period);
    report.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            incoming = source.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = device.handle_frame(&text, opts.fail_rate) {
                            sink.send(Message::Text(reply.into())).await?;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        sink.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                }
            }
            _ = report.tick() => {
                if let Some(frame) = device.next_report() {
                    let text = frame.serialize();
                    debug!("[{}] -> {}", device.device_id, text);
                    sink.send(Message::Text(text.into())).await?;
                }
            }
        }
    }
}

fn parse_args_from(mut args: impl Iterator<Item = String>) -> Result<SimOptions, String> {
    let mut opts = SimOptions::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--url" => opts.url = require(&mut args, "--url")?,
            "--vehicles" => opts.vehicles = parse_value(&mut args, "--vehicles")?,
            "--slots" => opts.slots = parse_value(&mut args, "--slots")?,
            "--interval" => {
                opts.interval = Duration::from_secs(parse_value(&mut args, "--interval")?);
            }
            "--fail-rate" => {
                let rate: f64 = parse_value(&mut args, "--fail-rate")?;
                if !(0.0..=1.0).contains(&rate) {
                    return Err(format!("--fail-rate must be within 0.0..=1.0, got {rate}"));
                }
                opts.fail_rate = rate;
            }
            other => return Err(format!("unknown argument {other:?}")),
        }
    }
    Ok(opts)
}

fn require(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, String> {
    args.next().ok_or_else(|| format!("{flag} needs a value"))
}

fn parse_value<T: std::str::FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &str,
) -> Result<T, String> {
    let raw = require(args, flag)?;
    raw.parse()
        .map_err(|_| format!("{flag}: invalid value {raw:?}"))
}

fn print_usage() {
    eprintln!("Usage: device-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --url <URL>        gateway address (default ws://127.0.0.1:9000)");
    eprintln!("  --vehicles <N>     simulate vehicles VH-1..VH-N (default 6)");
    eprintln!("  --slots <N>        simulate slot controllers LOT-1-S1..S<N> (default 4)");
    eprintln!("  --interval <SECS>  base telemetry period (default 15)");
    eprintln!("  --fail-rate <P>    probability of rejecting a command, 0.0..=1.0 (default 0)");
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if std::env::args().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    let opts = match parse_args_from(std::env::args().skip(1)) {
        Ok(opts) => opts,
        Err(msg) => {
            eprintln!("device-sim: {msg}");
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    };

    info!(
        "🔌 Device simulator: {} vehicles + {} slot controllers -> {}",
        opts.vehicles, opts.slots, opts.url
    );

    let mut sessions = Vec::new();
    for n in 1..=opts.vehicles {
        sessions.push(tokio::spawn(run_device(
            DeviceKind::Vehicle,
            format!("VH-{n}"),
            opts.clone(),
        )));
    }
    for n in 1..=opts.slots {
        sessions.push(tokio::spawn(run_device(
            DeviceKind::SlotController,
            format!("LOT-1-S{n}"),
            opts.clone(),
        )));
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("🛑 Ctrl+C received"),
        _ = futures_util::future::join_all(sessions) => info!("All device sessions ended"),
    }

    info!("👋 Device simulator stopped");
}

// ── Tests ──────────────────────────────────────────────────────
