use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use murmur::bridge::LanguageModelBridge;
use murmur::daemon::{build_voice_output, preflight};
use murmur::process::SystemRunner;
use murmur::transcript::{ConversationLog, TIMESTAMP_FORMAT};
use murmur::voice::{rms, sample_microphone};
use murmur::{Config, Daemon};

/// Murmur - hands-free voice assistant for a local language model
#[derive(Parser)]
#[command(name = "murmur", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Phrase that activates the assistant
    #[arg(long, env = "MURMUR_WAKE_PHRASE")]
    wake_phrase: Option<String>,

    /// Start listening for questions immediately, without a wake phrase
    #[arg(long)]
    no_wake_word: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// List the voices the synthesizer offers
    Voices,
    /// Speak text with the configured voice
    Say {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Ask the language model one question and print the reply
    Ask {
        /// Question to ask
        text: String,
    },
    /// Show recent conversation history
    History {
        /// Number of exchanges to show
        #[arg(short, long, default_value = "10")]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity; RUST_LOG wins when set
    let filter = match cli.verbose {
        0 => "info,murmur=info",
        1 => "info,murmur=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load_with_options(cli.wake_phrase.as_deref(), cli.no_wake_word)?;
    tracing::debug!(
        log = %config.log_path.display(),
        stt = ?config.stt.provider,
        tts = ?config.tts.provider,
        "loaded configuration"
    );

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(&config, duration).await,
            Command::Voices => list_voices(&config).await,
            Command::Say { text } => say(&config, &text).await,
            Command::Ask { text } => ask(&config, &text).await,
            Command::History { count } => history(&config, count),
        };
    }

    match &config.conversation.wake_phrase {
        Some(phrase) => tracing::info!("murmur ready - say \"{phrase}\""),
        None => tracing::info!("murmur ready - listening"),
    }

    Daemon::new(config).run().await?;
    Ok(())
}

/// Show a live RMS meter from the microphone
async fn test_mic(config: &Config, duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let device = config.capture.device.as_deref();
    let threshold = config.capture.energy_threshold;

    for i in 0..duration {
        let samples = sample_microphone(device, Duration::from_secs(1)).await?;
        let energy = rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);
        let marker = if energy > threshold { "speech" } else { "" };

        println!(
            "[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}] {marker}",
            i + 1
        );
    }

    println!("\n---");
    println!("Speech threshold is {threshold:.4} RMS before ambient calibration.");
    println!("If RMS stayed near 0, check that the right input device is selected.");

    Ok(())
}

/// Print the synthesizer's voices, marking the active one
async fn list_voices(config: &Config) -> anyhow::Result<()> {
    let output = build_voice_output(&config.tts, Arc::new(SystemRunner)).await?;
    let active = output.profile().active_voice_id();

    for voice in output.voices() {
        let mark = if voice.id == active { "*" } else { " " };
        let gender = voice.gender.as_deref().unwrap_or("-");
        println!("{mark} {:<16} {gender:<2} {}", voice.id, voice.name);
    }

    Ok(())
}

/// Speak text through the configured synthesizer
async fn say(config: &Config, text: &str) -> anyhow::Result<()> {
    let mut output = build_voice_output(&config.tts, Arc::new(SystemRunner)).await?;
    output.try_speak(text).await?;
    output.shutdown();
    Ok(())
}

/// Ask the language model once
async fn ask(config: &Config, text: &str) -> anyhow::Result<()> {
    preflight(config);

    let bridge = LanguageModelBridge::new(Arc::new(SystemRunner), &config.llm);
    println!("{}", bridge.query(text).await);
    Ok(())
}

/// Print the last `count` logged exchanges
fn history(config: &Config, count: usize) -> anyhow::Result<()> {
    let log = ConversationLog::new(&config.log_path);
    let records = log.records()?;

    if records.is_empty() {
        println!("No conversations logged at {}", log.path().display());
        return Ok(());
    }

    for record in records.iter().skip(records.len().saturating_sub(count)) {
        println!("[{}]", record.timestamp.format(TIMESTAMP_FORMAT));
        println!("  you: {}", record.user_text);
        println!("  murmur: {}\n", record.assistant_text);
    }

    Ok(())
}
