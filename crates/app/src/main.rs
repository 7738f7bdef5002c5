mod demo;
mod render;

use std::fmt;

use services::config::{BASE_URL_VAR, COHORT_VAR, ID_TOKEN_VAR};
use services::{ApiConfig, AppServices, Clock, ServiceError};
use storage::{Storage, StorageError};
use tracing::{debug, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt as log_fmt};
use tracker_core::model::{Cohort, User};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidCohort { raw: String },
    MissingCohort,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidCohort { raw } => write!(f, "invalid --cohort value: {raw:?}"),
            ArgsError::MissingCohort => {
                write!(f, "no cohort given and no signed-in user to take it from")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [scoreboard] [--cohort <name>] [options]");
    eprintln!("  cargo run -p app -- requirements [--cohort <name>] [--all] [options]");
    eprintln!("  cargo run -p app -- events [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --base-url <url>   API base url");
    eprintln!("  --token <token>    ID token sent as a bearer credential");
    eprintln!("  --demo             use seeded in-memory data instead of the API");
    eprintln!("  --all              include requirements hidden from the scoreboard");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  {BASE_URL_VAR}, {ID_TOKEN_VAR}, {COHORT_VAR}, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Scoreboard,
    Requirements,
    Events,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "scoreboard" => Some(Self::Scoreboard),
            "requirements" => Some(Self::Requirements),
            "events" => Some(Self::Events),
            _ => None,
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    base_url: Option<String>,
    token: Option<String>,
    cohort: Option<Cohort>,
    demo: bool,
    all: bool,
    help: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--base-url" => parsed.base_url = Some(require_value(args, "--base-url")?),
                "--token" => parsed.token = Some(require_value(args, "--token")?),
                "--cohort" => {
                    let value = require_value(args, "--cohort")?;
                    let cohort = Cohort::new(value.trim())
                        .map_err(|_| ArgsError::InvalidCohort { raw: value.clone() })?;
                    parsed.cohort = Some(cohort);
                }
                "--demo" => parsed.demo = true,
                "--all" => parsed.all = true,
                "--help" | "-h" => parsed.help = true,
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }
        Ok(parsed)
    }

    /// Flag value standing in for an environment variable.
    fn override_for(&self, key: &str) -> Option<String> {
        match key {
            BASE_URL_VAR => self.base_url.clone(),
            ID_TOKEN_VAR => self.token.clone(),
            COHORT_VAR => self.cohort.as_ref().map(ToString::to_string),
            _ => None,
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(log_fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// The signed-in user, or `None` when browsing anonymously.
async fn viewer(services: &AppServices) -> Result<Option<User>, ServiceError> {
    match services.current_user().await {
        Ok(user) => Ok(Some(user)),
        Err(ServiceError::Storage(StorageError::Unauthorized { .. })) => {
            debug!("no signed-in user");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Scoreboard,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Scoreboard,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let parsed = Args::parse(&mut argv.into_iter()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    if parsed.help {
        print_usage();
        return Ok(());
    }

    init_tracing();

    let clock = Clock::default_clock();
    let (services, configured_cohort) = if parsed.demo {
        let storage = Storage::from_repository(demo::repository(clock)?);
        (AppServices::new(storage, clock), parsed.cohort.clone())
    } else {
        let config = ApiConfig::from_lookup(|key| {
            parsed.override_for(key).or_else(|| std::env::var(key).ok())
        })?;
        debug!(?config, "loaded api config");
        let cohort = config.cohort.clone();
        (AppServices::from_config(&config, clock), cohort)
    };

    let viewer = viewer(&services).await?;
    let cohort = || {
        configured_cohort
            .clone()
            .or_else(|| viewer.as_ref().and_then(|user| user.dojo_cohort.clone()))
            .ok_or(ArgsError::MissingCohort)
    };

    match cmd {
        Command::Scoreboard => {
            let cohort = cohort()?;
            let board = services
                .scoreboard()
                .scoreboard(viewer.as_ref(), &cohort)
                .await?;
            print!("{}", render::scoreboard(&board));
        }
        Command::Requirements => {
            let cohort = cohort()?;
            let requirements = services.requirements();
            requirements.load(&cohort).await?;
            let list = requirements.requirements(&cohort, !parsed.all);
            print!("{}", render::requirements(&list, &cohort));
        }
        Command::Events => {
            let events = services.events();
            events.load().await?;
            let upcoming = viewer
                .as_ref()
                .map(|user| events.upcoming_meetings(&user.username));
            if viewer.is_none() {
                warn!("not signed in; upcoming meetings are not counted");
            }
            print!("{}", render::events(&events.events(), upcoming));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
