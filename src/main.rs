//! anycore - Multi-system emulator runtime
//!
//! Headless driver: loads a game through the session layer and runs a
//! fixed number of frames.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use ac_core::Settings;
use ac_media::NullDiscOpener;
use ac_module::{EmulateSpec, PixelFormat, Registry, Surface};
use ac_session::Session;

struct Args {
    path: PathBuf,
    module: Option<String>,
    frames: u32,
}

fn parse_args() -> Result<Args> {
    let mut path = None;
    let mut module = None;
    let mut frames = 60u32;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--module" => {
                module = Some(it.next().context("--module requires a system name")?);
            }
            "--frames" => {
                frames = it
                    .next()
                    .context("--frames requires a count")?
                    .parse()
                    .context("--frames count must be a number")?;
            }
            "--help" | "-h" => {
                eprintln!("usage: anycore <path> [--module <system>] [--frames <n>]");
                std::process::exit(0);
            }
            _ if path.is_none() => path = Some(PathBuf::from(arg)),
            other => bail!("unexpected argument: {other}"),
        }
    }

    Ok(Args {
        path: path.context("usage: anycore <path> [--module <system>] [--frames <n>]")?,
        module,
        frames,
    })
}

fn build_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register(ac_cdplay::info(), || Box::new(ac_cdplay::CdPlay::new()));
    registry
}

fn run() -> Result<()> {
    let args = parse_args()?;

    let mut settings = Settings::new();
    let config = settings.base_dir().join("anycore.cfg");
    if settings.load_file(&config)? {
        tracing::info!("loaded settings from {}", config.display());
    }

    let registry = Arc::new(build_registry());
    let mut session = Session::new(registry, settings, Box::new(NullDiscOpener));

    session.load(&args.path, args.module.as_deref())?;
    for notice in session.take_notices() {
        println!("{notice}");
    }

    let info = session
        .active_info()
        .context("no module active after load")?;
    let mut spec = EmulateSpec::new(Surface::new(
        info.lcm_width,
        info.lcm_height,
        PixelFormat::xrgb8888(),
    ));
    spec.enable_sound(48000.0, 48000 / 50 * 2, info.sound_channels as usize);

    let started = std::time::Instant::now();
    for _ in 0..args.frames {
        session.run_frame(&mut spec)?;
        for notice in session.take_notices() {
            println!("{notice}");
        }
    }
    let elapsed = started.elapsed();

    tracing::info!(
        frames = args.frames,
        elapsed_ms = elapsed.as_millis() as u64,
        "run complete"
    );
    session.close();
    Ok(())
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
