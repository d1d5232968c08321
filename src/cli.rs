//! CLI definition and dispatch.
//!
//! Every subcommand loads and validates the INI config first, installs the
//! tracing subscriber, then opens the configured store. Command bodies return
//! `Result` so they can be driven from tests; [`run`] maps errors to exit
//! codes.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{CsvPriceImporter, ImportSummary};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{validate_service_config, Backend, ServiceSettings};
use crate::domain::error::FolioError;
use crate::domain::money::Symbol;
use crate::domain::portfolio::{PortfolioId, UserId};
use crate::domain::prediction::{predict, Prediction};
use crate::domain::statistics::{portfolio_stats, PortfolioStats};
use crate::logging;
use crate::ports::config_port::ConfigPort;
use crate::ports::portfolio_port::PortfolioPort;
use crate::ports::price_port::PricePort;
use crate::ports::registry_port::StockRegistryPort;

#[derive(Parser, Debug)]
#[command(name = "stockfolio", about = "Stock portfolio ledger and analytics service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP API
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Create the database tables if missing
    InitDb {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Load daily price rows from a CSV file
    ImportPrices {
        #[arg(short, long)]
        config: PathBuf,
        /// CSV with symbol,company_name,date,open,high,low,close,volume
        file: PathBuf,
    },
    /// List registered stock symbols
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Project closing prices with a least-squares trend line
    Predict {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        days: Option<String>,
    },
    /// Print return statistics and correlations for a portfolio
    Stats {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        portfolio: PortfolioId,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Serve { config } => run_serve(&config),
        Command::InitDb { config } => run_init_db(&config),
        Command::ImportPrices { config, file } => {
            run_import_prices(&config, &file).map(|summary| report_import(&summary))
        }
        Command::ListSymbols { config } => run_list_symbols(&config).map(|symbols| {
            for symbol in &symbols {
                println!("{symbol}");
            }
            eprintln!("{} symbols found", symbols.len());
        }),
        Command::Predict {
            config,
            symbol,
            days,
        } => run_predict(&config, &symbol, days.as_deref()).and_then(|p| print_json(&p)),
        Command::Stats {
            config,
            user,
            portfolio,
        } => run_stats(&config, user, portfolio).and_then(|s| print_json(&s)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Parse the INI file, validate it, and install logging.
pub fn load_settings(path: &Path) -> Result<(FileConfigAdapter, ServiceSettings), FolioError> {
    let config = FileConfigAdapter::from_file(path)?;
    let settings = validate_service_config(&config)?;
    logging::init(&settings.log_filter);
    tracing::debug!(config = %path.display(), backend = ?settings.backend, "configuration loaded");
    Ok((config, settings))
}

/// A store backend implementing every port.
pub enum Store {
    #[cfg(feature = "sqlite")]
    Sqlite(crate::adapters::sqlite_adapter::SqliteAdapter),
    #[cfg(feature = "postgres")]
    Postgres(crate::adapters::postgres_adapter::PostgresAdapter),
}

fn backend_disabled(name: &str) -> FolioError {
    FolioError::ConfigInvalid {
        section: "database".to_string(),
        key: "backend".to_string(),
        reason: format!("built without the {name} feature"),
    }
}

impl Store {
    pub fn open(config: &dyn ConfigPort, backend: Backend) -> Result<Self, FolioError> {
        match backend {
            Backend::Sqlite => {
                #[cfg(feature = "sqlite")]
                {
                    crate::adapters::sqlite_adapter::SqliteAdapter::from_config(config)
                        .map(Store::Sqlite)
                }
                #[cfg(not(feature = "sqlite"))]
                {
                    let _ = config;
                    Err(backend_disabled("sqlite"))
                }
            }
            Backend::Postgres => {
                #[cfg(feature = "postgres")]
                {
                    crate::adapters::postgres_adapter::PostgresAdapter::from_config(config)
                        .map(Store::Postgres)
                }
                #[cfg(not(feature = "postgres"))]
                {
                    let _ = config;
                    Err(backend_disabled("postgres"))
                }
            }
        }
    }

    pub fn initialize_schema(&self) -> Result<(), FolioError> {
        match self {
            #[cfg(feature = "sqlite")]
            Store::Sqlite(s) => s.initialize_schema(),
            #[cfg(feature = "postgres")]
            Store::Postgres(s) => s.initialize_schema(),
        }
    }

    pub fn portfolios(&self) -> &dyn PortfolioPort {
        match self {
            #[cfg(feature = "sqlite")]
            Store::Sqlite(s) => s,
            #[cfg(feature = "postgres")]
            Store::Postgres(s) => s,
        }
    }

    pub fn prices(&self) -> &dyn PricePort {
        match self {
            #[cfg(feature = "sqlite")]
            Store::Sqlite(s) => s,
            #[cfg(feature = "postgres")]
            Store::Postgres(s) => s,
        }
    }

    pub fn registry(&self) -> &dyn StockRegistryPort {
        match self {
            #[cfg(feature = "sqlite")]
            Store::Sqlite(s) => s,
            #[cfg(feature = "postgres")]
            Store::Postgres(s) => s,
        }
    }

    #[cfg(feature = "web")]
    pub fn into_state(
        self,
        horizon: crate::domain::prediction::HorizonLimits,
    ) -> crate::adapters::web::AppState {
        use crate::adapters::web::AppState;
        use std::sync::Arc;

        match self {
            #[cfg(feature = "sqlite")]
            Store::Sqlite(s) => AppState::from_store(Arc::new(s), horizon),
            #[cfg(feature = "postgres")]
            Store::Postgres(s) => AppState::from_store(Arc::new(s), horizon),
        }
    }
}

fn open_store(config_path: &Path) -> Result<(Store, ServiceSettings), FolioError> {
    let (config, settings) = load_settings(config_path)?;
    let store = Store::open(&config, settings.backend)?;
    Ok((store, settings))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), FolioError> {
    let text = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    println!("{text}");
    Ok(())
}

fn report_import(summary: &ImportSummary) {
    for row in &summary.rejected {
        eprintln!("line {}: {}", row.line, row.reason);
    }
    eprintln!(
        "{} rows imported, {} duplicates skipped, {} rejected",
        summary.imported,
        summary.duplicates,
        summary.rejected.len()
    );
}

pub fn run_init_db(config_path: &Path) -> Result<(), FolioError> {
    let (store, settings) = open_store(config_path)?;
    store.initialize_schema()?;
    tracing::info!(backend = ?settings.backend, "schema initialized");
    Ok(())
}

pub fn run_import_prices(config_path: &Path, file: &Path) -> Result<ImportSummary, FolioError> {
    let (store, _) = open_store(config_path)?;
    store.initialize_schema()?;
    CsvPriceImporter::new(file).import(store.registry())
}

pub fn run_list_symbols(config_path: &Path) -> Result<Vec<String>, FolioError> {
    let (store, _) = open_store(config_path)?;
    store.registry().list_symbols()
}

pub fn run_predict(
    config_path: &Path,
    symbol: &str,
    days: Option<&str>,
) -> Result<Prediction, FolioError> {
    let (store, settings) = open_store(config_path)?;
    let symbol = Symbol::parse(symbol)?;
    let days = settings.horizon.parse(days)?;
    predict(store.prices(), &symbol, days)
}

pub fn run_stats(
    config_path: &Path,
    user_id: UserId,
    portfolio_id: PortfolioId,
) -> Result<PortfolioStats, FolioError> {
    let (store, _) = open_store(config_path)?;
    portfolio_stats(store.portfolios(), store.prices(), user_id, portfolio_id)
}

pub fn run_serve(config_path: &Path) -> Result<(), FolioError> {
    #[cfg(feature = "web")]
    {
        use crate::adapters::web::build_router;

        let (store, settings) = open_store(config_path)?;
        store.initialize_schema()?;
        let router = build_router(store.into_state(settings.horizon));

        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(async {
            let listener = tokio::net::TcpListener::bind(settings.bind).await?;
            tracing::info!(addr = %settings.bind, "listening");
            axum::serve(listener, router).await
        })?;
        Ok(())
    }

    #[cfg(not(feature = "web"))]
    {
        let _ = config_path;
        Err(FolioError::ConfigInvalid {
            section: "server".to_string(),
            key: "bind".to_string(),
            reason: "built without the web feature".to_string(),
        })
    }
}
