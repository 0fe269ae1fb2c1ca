use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueHint};

use studyflow::backend::http::SERVER_URL_ENV;
use studyflow::backend::{HttpBackend, StudyBackend};
use studyflow::commands::drill::DrillOptions;
use studyflow::commands::{check, drill, streak};
use studyflow::config::EngineConfig;
use studyflow::crud::{DB, LocalBackend};
use studyflow::deck::{Deck, load_deck};
use studyflow::utils::get_data_dir;

#[derive(Parser, Debug)]
#[command(
    name = "studyflow",
    version,
    about = "Study decks with checkpoint quizzes and a daily streak.",
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true,
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Study a deck, one item at a time
    Drill {
        /// Deck file (JSON). Optional when studying a set from a server.
        #[arg(value_name = "DECK", value_hint = ValueHint::FilePath)]
        deck: Option<PathBuf>,
        /// Study service to load the set from and report points to.
        /// Falls back to the STUDYFLOW_SERVER_URL environment variable.
        #[arg(long, value_name = "URL")]
        server: Option<String>,
        /// Set id on the server. Defaults to the deck's id.
        #[arg(long = "set", value_name = "ID")]
        set_id: Option<String>,
        /// Randomize the order of items
        #[arg(long, default_value_t = false)]
        shuffle: bool,
        /// Ignore saved progress and start from the first item
        #[arg(long, default_value_t = false)]
        restart: bool,
        /// Items between two checkpoints
        #[arg(long, value_name = "COUNT")]
        checkpoint_size: Option<usize>,
        /// Points needed per day when studying offline
        #[arg(long, value_name = "POINTS")]
        daily_goal: Option<u32>,
        /// Ignore punctuation in typed answers
        #[arg(long, default_value_t = false)]
        strip_punctuation: bool,
    },
    /// Show today's points and the current streak
    Streak {
        #[arg(long, value_name = "URL")]
        server: Option<String>,
    },
    /// Validate a deck and preview its checkpoints
    Check {
        #[arg(value_name = "DECK", value_hint = ValueHint::FilePath)]
        deck: PathBuf,
        /// Items between two checkpoints
        #[arg(long, value_name = "COUNT")]
        checkpoint_size: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(err) = run_cli().await {
        eprintln!("{:?}", err);
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let mut config = EngineConfig::load_from_dir(&get_data_dir()?)?;

    match cli.command {
        Command::Drill {
            deck,
            server,
            set_id,
            shuffle,
            restart,
            checkpoint_size,
            daily_goal,
            strip_punctuation,
        } => {
            if let Some(size) = checkpoint_size {
                config.checkpoint_size = size;
            }
            if let Some(goal) = daily_goal {
                config.daily_goal = goal;
            }
            if strip_punctuation {
                config.normalize.strip_punctuation = true;
            }
            let config = config.sanitized();

            let deck = deck.as_deref().map(load_deck).transpose()?;
            let options = DrillOptions { shuffle, restart };

            match server_url(server) {
                Some(url) => {
                    let set_id = match (set_id, &deck) {
                        (Some(id), _) => id,
                        (None, Some(deck)) => deck.set_id.clone(),
                        (None, None) => bail!("Pass a deck file or --set to choose what to study"),
                    };
                    let title = deck.as_ref().map_or(set_id.clone(), |d| d.title.clone());
                    let backend: Arc<dyn StudyBackend> = Arc::new(HttpBackend::new(&url)?);
                    drill::run(backend, &set_id, &title, config, options).await?;
                }
                None => {
                    let Some(Deck {
                        set_id, title, items, ..
                    }) = deck
                    else {
                        bail!("A deck file is required without a server");
                    };
                    let mut local = LocalBackend::new(DB::new().await?, config.daily_goal);
                    local.register(set_id.clone(), items);
                    drill::run(Arc::new(local), &set_id, &title, config, options).await?;
                }
            }
        }
        Command::Streak { server } => match server_url(server) {
            Some(url) => streak::run(&HttpBackend::new(&url)?).await?,
            None => {
                let local = LocalBackend::new(DB::new().await?, config.daily_goal);
                streak::run(&local).await?;
            }
        },
        Command::Check {
            deck,
            checkpoint_size,
        } => {
            if let Some(size) = checkpoint_size {
                config.checkpoint_size = size;
            }
            let deck = load_deck(&deck)
                .with_context(|| "Fix the deck file and run check again")?;
            check::run(&deck, &config.sanitized());
        }
    }

    Ok(())
}

fn server_url(flag: Option<String>) -> Option<String> {
    flag.or_else(|| std::env::var(SERVER_URL_ENV).ok())
        .filter(|url| !url.trim().is_empty())
}
