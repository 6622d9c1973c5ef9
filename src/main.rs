//! # Departure Board Application Entry Point
//!
//! This binary wires the library together: it loads configuration, opens the
//! selected display sink, builds the shared display context and runs the
//! render loop until Ctrl-C or SIGTERM.
//!
//! ## Modes
//! - `--stdout`: print frames as ASCII art (development without hardware)
//! - `--headless`: render but discard frames (also `display.headless`)
//! - default: drive the SSD1322 panel (Linux with `--features hardware`)
//!
//! `--config <path>` reads a configuration file other than
//! `departure-config.toml`. Logging goes through `env_logger`; set `RUST_LOG`
//! to `debug` to see every request and layout swap.

// Test modules
#[cfg(test)]
mod tests;

use anyhow::Context;
use departure_board_lib::config::Config;
use departure_board_lib::context::DisplayContext;
use departure_board_lib::display::{DisplaySink, NullSink, TerminalSink, PANEL_HEIGHT, PANEL_WIDTH};
use departure_board_lib::scheduler::RefreshScheduler;
use departure_board_lib::tfl::TflClient;
use departure_board_lib::SignageComposer;
use env_logger::Env;
use log::{info, warn};
use std::env;
use std::path::PathBuf;
use std::rc::Rc;

/// Command line switches.
#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    stdout: bool,
    headless: bool,
    config: Option<PathBuf>,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> anyhow::Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--stdout" => parsed.stdout = true,
            "--headless" => parsed.headless = true,
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                parsed.config = Some(PathBuf::from(path));
            }
            other => warn!("Ignoring unknown argument {}", other),
        }
    }
    Ok(parsed)
}

/// Pick the frame destination for this run.
fn open_sink(args: &Args, config: &Config) -> anyhow::Result<Box<dyn DisplaySink>> {
    if args.stdout {
        info!("Development mode: printing frames to stdout");
        return Ok(Box::new(TerminalSink::new(std::io::stdout())));
    }
    if args.headless || config.display.headless {
        info!("Headless mode: frames are discarded");
        return Ok(Box::new(NullSink::default()));
    }

    #[cfg(all(target_os = "linux", feature = "hardware"))]
    {
        open_panel(config)
    }

    #[cfg(not(all(target_os = "linux", feature = "hardware")))]
    {
        anyhow::bail!("Panel support not enabled. Rebuild with --features hardware on Linux, or use --stdout / --headless")
    }
}

/// Initialize the SSD1322 over spidev with DC and RST on gpiochip lines.
#[cfg(all(target_os = "linux", feature = "hardware"))]
fn open_panel(config: &Config) -> anyhow::Result<Box<dyn DisplaySink>> {
    use departure_board_lib::display::Rotation;
    use departure_board_lib::ssd1322::Ssd1322;
    use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
    use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
    use linux_embedded_hal::{CdevPin, Delay, SpidevDevice};

    let hw = &config.display.hardware;
    info!(
        "Opening SSD1322 on {} (DC GPIO {}, RST GPIO {})",
        hw.spi_device, hw.dc_pin, hw.rst_pin
    );

    let mut spi = SpidevDevice::open(&hw.spi_device)
        .with_context(|| format!("open {}", hw.spi_device))?;
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(hw.spi_speed_hz)
        .mode(SpiModeFlags::SPI_MODE_0)
        .build();
    spi.configure(&options).context("configure SPI")?;

    let mut chip = Chip::new(&hw.gpio_chip).with_context(|| format!("open {}", hw.gpio_chip))?;
    let dc = chip
        .get_line(hw.dc_pin)?
        .request(LineRequestFlags::OUTPUT, 0, "departure-board-dc")?;
    let rst = chip
        .get_line(hw.rst_pin)?
        .request(LineRequestFlags::OUTPUT, 1, "departure-board-rst")?;

    let rotation = Rotation::from_quarter_turns(config.display.screen_rotation)
        .context("unsupported screen_rotation")?;
    let mut panel = Ssd1322::new(spi, CdevPin::new(dc)?, CdevPin::new(rst)?, rotation);
    panel.init(&mut Delay)?;
    Ok(Box::new(panel))
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

async fn run(config: Config, sink: Box<dyn DisplaySink>) -> anyhow::Result<()> {
    let ctx = Rc::new(DisplayContext::with_defaults());
    let composer = SignageComposer::new(
        ctx,
        PANEL_WIDTH,
        PANEL_HEIGHT,
        config.refresh_interval()?,
        config.journey.out_of_hours_name.clone(),
    );
    let source = TflClient::new(&config.api, &config.journey).context("create HTTP client")?;

    let mut scheduler = RefreshScheduler::new(
        source,
        sink,
        composer,
        config.stations(),
        config.frame_interval()?,
    )?
    .with_operating_hours(config.journey.operating_hours);

    scheduler.run(shutdown_signal()).await?;
    Ok(())
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    info!("Starting departure board v{}", env!("CARGO_PKG_VERSION"));

    let args = parse_args(env::args().skip(1))?;
    let config = match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
    .context("load configuration")?;

    let sink = open_sink(&args, &config)?;

    // Single-threaded: widgets share the display context through Rc
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config, sink))?;

    info!("Departure board stopped");
    Ok(())
}
