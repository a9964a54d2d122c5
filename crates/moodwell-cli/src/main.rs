use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

use moodwell_bus::EventBus;
use moodwell_core::{load_config, SessionController, WellnessConfig};
use moodwell_schema::Entry;

#[derive(Parser)]
#[command(name = "moodwell", version, about = "Local mood journal")]
struct Cli {
    #[arg(
        long,
        default_value = "~/.moodwell",
        help = "Root directory (contains config/, data/ and logs/)"
    )]
    root: PathBuf,

    #[arg(long, help = "Profile to use instead of the configured one")]
    profile: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Write a journal entry")]
    Submit {
        #[arg(default_value = "", help = "What is on your mind")]
        text: String,
        #[arg(long, help = "An image was captured with this entry")]
        image: bool,
    },
    #[command(about = "List entries, oldest first")]
    List {
        #[arg(long, help = "Print raw JSON")]
        json: bool,
    },
    #[command(about = "Delete one entry")]
    Delete { id: Uuid },
    #[command(about = "Delete every entry in the profile")]
    Clear,
    #[command(about = "Show mood statistics")]
    Summary {
        #[arg(long, help = "Print raw JSON")]
        json: bool,
    },
    #[command(about = "Validate the config file")]
    Validate,
}

fn expand_home(path: PathBuf, home: Option<PathBuf>) -> PathBuf {
    if !path.starts_with("~") {
        return path;
    }
    match home {
        Some(home) => home.join(path.strip_prefix("~").unwrap_or(&path)),
        None => path,
    }
}

fn init_logging(root: &Path) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "moodwell.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();
    Ok(guard)
}

fn load(cli: &Cli) -> Result<WellnessConfig> {
    let mut config = load_config(&cli.root.join("config").join("main.yaml"))?;
    if let Some(profile) = &cli.profile {
        config.profile = profile.clone();
        config.validate()?;
    }
    Ok(config)
}

fn print_entry(entry: &Entry) {
    println!(
        "{}  {}  {:<8} {:.2}{}",
        entry.id,
        entry.timestamp.format("%Y-%m-%d %H:%M"),
        entry.mood.as_str(),
        entry.confidence,
        if entry.has_image { "  [image]" } else { "" }
    );
    if let Some(text) = &entry.text_input {
        println!("    {text}");
    }
    if let Some(insight) = &entry.ai_insight {
        println!("    > {insight}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();
    cli.root = expand_home(cli.root, std::env::var_os("HOME").map(PathBuf::from));

    let _guard = init_logging(&cli.root)?;

    let Some(command) = cli.command.take() else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = load(&cli)?;
    tracing::debug!(root = %cli.root.display(), profile = %config.profile, "config loaded");
    let data_dir = cli.root.join("data");
    let bus = EventBus::new(config.bus.capacity);
    let open = || SessionController::from_config(&config, &data_dir, bus.publisher());

    match command {
        Commands::Validate => {
            println!(
                "Config valid. profile '{}', {:?} storage, {}ms step timeout.",
                config.profile, config.storage.backend, config.controller.step_timeout_ms
            );
        }
        Commands::Submit { text, image } => {
            let entry = open()?.submit(&text, image).await?;
            print_entry(&entry);
        }
        Commands::List { json } => {
            let outcome = open()?.entries().await;
            if let Some(detail) = &outcome.corruption {
                eprintln!("warning: journal data could not be read ({detail})");
            }
            if let Some(detail) = &outcome.unavailable {
                eprintln!("warning: journal storage is unavailable ({detail})");
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome.entries)?);
            } else if outcome.entries.is_empty() {
                println!("No entries yet.");
            } else {
                outcome.entries.iter().for_each(print_entry);
            }
        }
        Commands::Delete { id } => {
            if !open()?.delete(id).await? {
                return Err(anyhow!("no entry with id {id}"));
            }
            println!("Deleted {id}.");
        }
        Commands::Clear => {
            open()?.clear().await?;
            println!("Journal cleared.");
        }
        Commands::Summary { json } => {
            let summary = open()?.summary().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{} entries", summary.total);
                if let Some(mood) = summary.dominant {
                    println!("Most frequent mood: {mood}");
                }
                for (mood, count) in &summary.counts {
                    println!("  {:<8} {count}", mood.as_str());
                }
                println!("Average confidence: {:.2}", summary.mean_confidence);
                let e = summary.mean_emotions;
                println!(
                    "Average emotions: happiness {:.2}, sadness {:.2}, anxiety {:.2}, anger {:.2}",
                    e.happiness, e.sadness, e.anxiety, e.anger
                );
            }
        }
    }
    Ok(())
}
