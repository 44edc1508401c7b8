//! CLI argument parser.
//!
//! Besides `--daemon`, the binary offers one-shot commands for trying
//! the media pipeline by hand: synthesis, image search and cleanup.

use std::path::PathBuf;

use clap::Parser;

/// anki-media-daemon: speech and image enrichment for flashcards
#[derive(Parser, Debug)]
#[command(name = "anki-media-daemon")]
#[command(about = "Pronunciation audio, card images and CEFR voting for flashcards")]
#[command(version)]
pub struct Cli {
    /// Text to synthesize
    #[arg(short, long)]
    pub text: Option<String>,

    /// Voice to synthesize with (defaults to ANKI_MEDIA_VOICE or nl_NL-rdh-medium)
    #[arg(short, long)]
    pub voice: Option<String>,

    /// Card id; with --text, generates the card's reference audio in the data directory
    #[arg(short, long)]
    pub card_id: Option<String>,

    /// Output audio file for plain synthesis
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Search an image provider and cache the result
    #[arg(short = 'q', long)]
    pub image_query: Option<String>,

    /// Image provider: unsplash, pexels or pixabay
    #[arg(short, long, default_value = "unsplash")]
    pub provider: String,

    /// Remove expired cached images and reference audio
    #[arg(long)]
    pub sweep: bool,

    /// Root directory for audio, images and the cache index
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Run in daemon mode (JSON-RPC over stdio)
    #[arg(long)]
    pub daemon: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Returns true if running in daemon mode.
    pub fn is_daemon_mode(&self) -> bool {
        self.daemon
    }

    /// Returns true if a one-shot command was requested.
    pub fn is_cli_mode(&self) -> bool {
        !self.daemon && (self.text.is_some() || self.image_query.is_some() || self.sweep)
    }

    /// Returns the effective output path for plain synthesis.
    ///
    /// Defaults to "output.mp3" in the current directory if not specified.
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| PathBuf::from("output.mp3"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["anki-media-daemon"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn daemon_mode_detection() {
        let cli = parse(&["--daemon"]);
        assert!(cli.is_daemon_mode());
        assert!(!cli.is_cli_mode());
    }

    #[test]
    fn cli_mode_detection() {
        assert!(parse(&["--text", "hallo"]).is_cli_mode());
        assert!(parse(&["-q", "fiets"]).is_cli_mode());
        assert!(parse(&["--sweep"]).is_cli_mode());
        assert!(!parse(&[]).is_cli_mode());
    }

    #[test]
    fn output_path_default() {
        let cli = parse(&["--text", "hallo"]);
        assert_eq!(cli.output_path(), PathBuf::from("output.mp3"));
        let cli = parse(&["--text", "hallo", "-o", "x.wav"]);
        assert_eq!(cli.output_path(), PathBuf::from("x.wav"));
    }

    #[test]
    fn provider_defaults_to_unsplash() {
        let cli = parse(&["--image-query", "kat"]);
        assert_eq!(cli.provider, "unsplash");
        let cli = parse(&["--image-query", "kat", "--provider", "pexels"]);
        assert_eq!(cli.provider, "pexels");
    }

    #[test]
    fn card_reference_flags() {
        let cli = parse(&["-t", "de fiets", "-c", "card1", "-v", "nl_BE-nathalie-medium"]);
        assert_eq!(cli.card_id.as_deref(), Some("card1"));
        assert_eq!(cli.voice.as_deref(), Some("nl_BE-nathalie-medium"));
    }
}
