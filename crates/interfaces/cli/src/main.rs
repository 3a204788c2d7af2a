use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use entelgia_config::AppConfig;
use entelgia_runtime::SessionDump;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "entelgia", version, about = "Multi-persona AI dialogue orchestration")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, default_value = "entelgia.toml")]
    config: PathBuf,

    /// Seed for the session's single PRNG. Random if omitted.
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();

    let config = match AppConfig::load_from(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("fatal: failed to load configuration: {err:#}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = config.validate() {
        eprintln!("fatal: invalid configuration: {err}");
        return ExitCode::FAILURE;
    }
    if let Err(err) = config.load_secret_key() {
        eprintln!("fatal: {err}");
        return ExitCode::FAILURE;
    }

    let seed = cli.seed.unwrap_or_else(rand::random);
    let show_pronouns = config.dialogue.show_pronouns;

    tokio::select! {
        result = entelgia_runtime::run_session_with(config, seed, move |utterance| print_turn(utterance, show_pronouns)) => {
            match result {
                Ok(dump) => {
                    print_summary(&dump);
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    eprintln!("fatal: {err:#}");
                    ExitCode::FAILURE
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            eprintln!("interrupted");
            ExitCode::from(130)
        }
    }
}

fn print_turn(utterance: &entelgia_runtime::Utterance, show_pronouns: bool) {
    let label = speaker_label(&utterance.role, show_pronouns);
    println!("[{:>3}] {label}: {}", utterance.turn_index, utterance.text);
}

fn speaker_label(role: &str, show_pronouns: bool) -> String {
    if !show_pronouns {
        return role.to_string();
    }
    let pronoun = match role {
        "Socrates" => Some("he"),
        "Athena" => Some("she"),
        "Fixy" => Some("they"),
        _ => None,
    };
    match pronoun {
        Some(pronoun) => format!("{role} ({pronoun})"),
        None => role.to_string(),
    }
}

fn print_summary(dump: &SessionDump) {
    println!("--- session {} ended: {} ---", dump.session_id, dump.stop_reason);
    println!(
        "circularity={:.2} progress={:.2} intervention_utility={:.2}",
        dump.metrics.circularity_rate, dump.metrics.progress_rate, dump.metrics.intervention_utility
    );
}
