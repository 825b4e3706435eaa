use intersection_flow::config::{self, Config, ControllerSettings};
use intersection_flow::control::{Board, spawn_control_thread};
use intersection_flow::direction::Direction;
use intersection_flow::peripheral::{AudioSampler, LightBoard, TagReader};
use intersection_flow::sensor::RangeSensor;
use intersection_flow::state::IntersectionState;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

type DynBoard = Board<
    Box<dyn RangeSensor + Send>,
    Box<dyn TagReader + Send>,
    Box<dyn AudioSampler + Send>,
    Box<dyn LightBoard + Send>,
>;

fn parse_level(level: &str) -> tracing::Level {
    level.parse().unwrap_or(tracing::Level::INFO)
}

fn init_tracing(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(parse_level(level))
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_default()?;
    init_tracing(config.log_level());
    tracing::info!(
        config_path = config::DEFAULT_CONFIG_PATH,
        app = %config.app.name,
        "intersection-flow starting"
    );

    let settings = config.controller_settings();
    tracing::info!(
        min_green_ms = settings.min_green_ms,
        max_green_ms = settings.max_green_ms,
        yellow_ms = settings.phase.yellow_ms,
        all_red_ms = settings.phase.all_red_ms,
        siren_direction = %settings.siren_direction,
        "Controller settings resolved"
    );

    let board = build_board(&config, &settings);
    let state = IntersectionState::new(settings, 0);

    let mut lights_rx = state.subscribe_lights();
    tokio::spawn(async move {
        while lights_rx.changed().await.is_ok() {
            let frame = *lights_rx.borrow_and_update();
            tracing::info!(
                north = ?frame[Direction::North],
                south = ?frame[Direction::South],
                east = ?frame[Direction::East],
                west = ?frame[Direction::West],
                "Signal heads updated"
            );
        }
    });

    let stop_flag = Arc::new(AtomicBool::new(false));
    let control_handle = spawn_control_thread(state, board, Arc::clone(&stop_flag));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    stop_flag.store(true, Ordering::Relaxed);

    match tokio::task::spawn_blocking(move || control_handle.join()).await {
        Ok(Ok(())) => tracing::info!("Control thread stopped, all heads red"),
        Ok(Err(_)) => tracing::error!("Control thread panicked"),
        Err(err) => tracing::error!(error = %err, "Failed to join control thread"),
    }

    Ok(())
}

/// Open every configured peripheral. Anything missing or failing degrades to
/// a neutral stand-in so the intersection still cycles.
#[cfg(target_os = "linux")]
fn build_board(config: &Config, settings: &ControllerSettings) -> DynBoard {
    use intersection_flow::bus::open_range_bus;
    use intersection_flow::bus::xshut::RppalXshutController;
    use intersection_flow::peripheral::Unwired;
    use intersection_flow::peripheral::gpio_lights::{ConsoleLightBoard, GpioLightBoard};
    use intersection_flow::peripheral::mcp3008::{Mcp3008Sampler, ScanSettings};
    use intersection_flow::peripheral::rdm6300::Rdm6300Reader;
    use intersection_flow::sensor::vl53l1x::Vl53l1xFactory;

    let range: Box<dyn RangeSensor + Send> = match config.xshut_pins() {
        Some(pins) => {
            tracing::info!(pins = ?pins, "Starting sensor discovery");
            match RppalXshutController::new(pins.values().copied())
                .and_then(|xshut| open_range_bus(xshut, Vl53l1xFactory::default(), &pins))
            {
                Ok(bus) => Box::new(bus),
                Err(err) => {
                    tracing::warn!(error = %err, "Range sensors unavailable, approaches read as empty");
                    Box::new(Unwired)
                }
            }
        }
        None => {
            tracing::warn!("No [hardware].xshut_pins configured, approaches read as empty");
            Box::new(Unwired)
        }
    };

    let tags: Box<dyn TagReader + Send> = match config.rfid_uart() {
        Some(path) => match Rdm6300Reader::open(path) {
            Ok(reader) => {
                tracing::info!(path = %path.display(), "RFID reader opened");
                Box::new(reader)
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "RFID reader unavailable");
                Box::new(Unwired)
            }
        },
        None => {
            tracing::warn!("No RFID reader configured");
            Box::new(Unwired)
        }
    };

    let audio: Box<dyn AudioSampler + Send> = match config.microphone_channel() {
        Some(channel) => {
            let scan = ScanSettings {
                channel,
                sample_count: settings.siren.sample_count,
                spacing: settings.sample_spacing,
            };
            match Mcp3008Sampler::open(scan) {
                Ok(sampler) => Box::new(sampler),
                Err(err) => {
                    tracing::warn!(error = %err, "Microphone unavailable, siren detection disabled");
                    Box::new(Unwired)
                }
            }
        }
        None => {
            tracing::warn!("No microphone configured, siren detection disabled");
            Box::new(Unwired)
        }
    };

    let lights: Box<dyn LightBoard + Send> = match config.hardware() {
        Some(hardware) => match GpioLightBoard::new(&hardware.lights.to_map()) {
            Ok(board) => Box::new(board),
            Err(err) => {
                tracing::error!(error = %err, "Signal heads unavailable, logging lights only");
                Box::new(ConsoleLightBoard)
            }
        },
        None => {
            tracing::warn!("No [hardware] section, logging lights only");
            Box::new(ConsoleLightBoard)
        }
    };

    Board {
        range,
        tags,
        audio,
        lights,
    }
}

#[cfg(not(target_os = "linux"))]
fn build_board(config: &Config, settings: &ControllerSettings) -> DynBoard {
    use intersection_flow::peripheral::Unwired;
    use intersection_flow::peripheral::gpio_lights::ConsoleLightBoard;

    let _ = (config, settings);
    tracing::warn!("Peripherals require Linux/Raspberry Pi - running an idle simulated intersection");
    Board {
        range: Box::new(Unwired),
        tags: Box::new(Unwired),
        audio: Box::new(Unwired),
        lights: Box::new(ConsoleLightBoard),
    }
}
