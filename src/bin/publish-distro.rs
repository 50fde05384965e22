use archive_publisher::clock::SystemClock;
use archive_publisher::config::PublisherConfig;
use archive_publisher::database::Database;
use archive_publisher::dominator::VersionDominator;
use archive_publisher::logging::LoggingArgs;
use archive_publisher::model::SuiteKey;
use archive_publisher::pool::FilesystemPool;
use archive_publisher::signing::GpgSigner;
use archive_publisher::{CarefulFlags, Publisher, PublisherError, PublisherResult, RunSummary};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Publish a distribution archive to disk")]
struct Args {
    /// Path to configuration.
    #[clap(long, default_value = "publisher.json")]
    config: PathBuf,

    /// Archive to publish; defaults to the primary archive.
    #[clap(long)]
    archive: Option<String>,

    /// Only publish these suites, e.g. `focal-updates`.
    #[clap(short = 's', long = "suite")]
    suites: Vec<String>,

    /// Process every suite in every stage.
    #[clap(short = 'C', long)]
    careful: bool,

    /// Republish already published records to the pool.
    #[clap(short = 'P', long)]
    careful_publishing: bool,

    /// Dominate every suite.
    #[clap(short = 'D', long)]
    careful_domination: bool,

    /// Write indexes for every suite.
    #[clap(short = 'A', long)]
    careful_apt: bool,

    /// Write Release files for every suite.
    #[clap(short = 'R', long)]
    careful_release: bool,

    /// Override the dists root.
    #[clap(long)]
    distsroot: Option<PathBuf>,

    /// Database URL; defaults to the one in the configuration.
    #[clap(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(flatten)]
    logging: LoggingArgs,
}

impl Args {
    fn careful_flags(&self) -> CarefulFlags {
        CarefulFlags {
            publishing: self.careful || self.careful_publishing,
            domination: self.careful || self.careful_domination,
            apt: self.careful || self.careful_apt,
            release: self.careful || self.careful_release,
        }
    }
}

fn run(args: &Args) -> PublisherResult<RunSummary> {
    let config = PublisherConfig::from_file(&args.config)?;

    let archive_config = match &args.archive {
        Some(name) => config
            .get_archive(name)
            .ok_or_else(|| PublisherError::Configuration(format!("Unknown archive: {}", name)))?,
        None => config
            .default_archive()
            .ok_or_else(|| PublisherError::Configuration("No archives configured".to_string()))?,
    };
    let mut archive = archive_config.to_archive();
    if let Some(distsroot) = &args.distsroot {
        archive.dists_root = distsroot.clone();
    }

    let distribution = config.distribution.to_distribution();
    let series_names: Vec<&str> = distribution.series.iter().map(|s| s.name.as_str()).collect();
    let suites = args
        .suites
        .iter()
        .map(|name| {
            SuiteKey::parse_suite(name, &series_names)
                .ok_or_else(|| PublisherError::Configuration(format!("Unknown suite: {}", name)))
        })
        .collect::<PublisherResult<Vec<_>>>()?;

    let url = args
        .database_url
        .clone()
        .unwrap_or_else(|| config.database.url.clone());
    let database = Database::connect(&url, config.database.max_connections)?;
    database.initialize_schema()?;

    let pool = FilesystemPool::new(&archive.root);
    let dominator = VersionDominator;
    let clock = SystemClock;
    let signer = GpgSigner::new(config.gpg_home.clone());

    info!(
        "Publishing {} to {}",
        archive.name,
        archive.dists_root.display()
    );
    Publisher::new(
        &archive,
        &distribution,
        &database,
        &database,
        &pool,
        &dominator,
        &clock,
    )
    .with_signer(Some(&signer))
    .with_allowed_suites(suites)
    .with_careful(args.careful_flags())
    .with_stay_of_execution(config.stay_of_execution())
    .run()
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = args.logging.init() {
        eprintln!("Failed to initialise logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Publishing failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
