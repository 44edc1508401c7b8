//! anki-media-daemon: speech and image enrichment for flashcards.
//!
//! This binary can run in two modes:
//! - CLI mode: one-shot synthesis, image search or cleanup
//! - Daemon mode: JSON-RPC server over stdio

use std::fs;

use anyhow::{bail, Context, Result};
use tracing::info;

use anki_media_daemon::cli::Cli;
use anki_media_daemon::config::DaemonConfig;
use anki_media_daemon::images::ImageService;
use anki_media_daemon::logging;
use anki_media_daemon::rpc::{run_server, ServerState};
use anki_media_daemon::tts::AudioService;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse_args();
    logging::init();

    let mut config = DaemonConfig::from_env();
    if let Some(dir) = &cli.data_dir {
        config.data_path = Some(dir.clone());
    }
    if let Some(problem) = config.validate() {
        bail!("Invalid configuration: {}", problem);
    }

    if cli.is_daemon_mode() {
        run_daemon_mode(config)
    } else if cli.is_cli_mode() {
        run_cli_mode(&cli, &config)
    } else {
        print_usage();
        Ok(())
    }
}

/// Runs the requested one-shot commands in order: synthesis, image, sweep.
fn run_cli_mode(cli: &Cli, config: &DaemonConfig) -> Result<()> {
    if let Some(text) = &cli.text {
        let audio = AudioService::from_config(config)?;
        match &cli.card_id {
            Some(card_id) => {
                let meta = audio
                    .generate_reference_audio(text, card_id, cli.voice.as_deref())
                    .with_context(|| format!("Reference audio for card {}", card_id))?;
                println!("{}", meta.reference_path.display());
            }
            None => {
                let bytes = audio.synthesize(text, cli.voice.as_deref())?;
                let output = cli.output_path();
                fs::write(&output, &bytes)
                    .with_context(|| format!("Failed to write {}", output.display()))?;
                info!(path = %output.display(), bytes = bytes.len(), "Saved audio");
                println!("{}", output.display());
            }
        }
    }

    if let Some(query) = &cli.image_query {
        let mut images = ImageService::from_config(config)?;
        match images.search_image(query, &cli.provider)? {
            Some(image) => {
                println!("{}", image.cached_path);
                println!("{}", image.attribution_text);
            }
            None => eprintln!("No image found for \"{}\" on {}", query, cli.provider),
        }
    }

    if cli.sweep {
        let mut images = ImageService::from_config(config)?;
        let report = images.cleanup_expired_cache()?;
        let audio = AudioService::from_config(config)?;
        let deleted = audio.cleanup_expired_audio()?;
        println!(
            "Removed {} cached images ({} bytes) and {} audio files",
            report.evicted.len(),
            report.freed_bytes,
            deleted
        );
    }

    Ok(())
}

/// Runs the daemon mode (JSON-RPC server).
fn run_daemon_mode(config: DaemonConfig) -> Result<()> {
    info!(
        data_path = %config.effective_data_path().display(),
        piper = %config.tts.piper_url,
        "Starting anki-media-daemon JSON-RPC server"
    );

    let state = ServerState::new(config).context("Failed to initialize daemon state")?;
    run_server(state)?;
    Ok(())
}

/// Prints usage information.
fn print_usage() {
    eprintln!("anki-media-daemon: pronunciation audio and images for flashcards");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  Synthesize to a file:");
    eprintln!("    anki-media-daemon --text \"de fiets\" --output fiets.mp3");
    eprintln!();
    eprintln!("  Card reference audio:");
    eprintln!("    anki-media-daemon --text \"de fiets\" --card-id card1");
    eprintln!();
    eprintln!("  Image search:");
    eprintln!("    anki-media-daemon --image-query fiets --provider pexels");
    eprintln!();
    eprintln!("  Cleanup:");
    eprintln!("    anki-media-daemon --sweep");
    eprintln!();
    eprintln!("  Daemon mode (JSON-RPC server):");
    eprintln!("    anki-media-daemon --daemon");
    eprintln!();
    eprintln!("Run 'anki-media-daemon --help' for full options.");
}
