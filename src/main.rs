use agromarket::cli::analysis::AnalysisOptions;
use agromarket::cli::export::ExportOptions;
use agromarket::cli::{FilterOptions, ListingOptions, ProductOptions};
use agromarket::core::log::init_logging;
use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for agromarket::AppCommand {
    fn from(cmd: Commands) -> agromarket::AppCommand {
        match cmd {
            Commands::Login { username, password } => {
                agromarket::AppCommand::Login { username, password }
            }
            Commands::Logout => agromarket::AppCommand::Logout,
            Commands::Whoami => agromarket::AppCommand::Whoami,
            Commands::Dashboard => agromarket::AppCommand::Dashboard,
            Commands::Prices(options) => agromarket::AppCommand::Prices(options),
            Commands::Optimal(options) => agromarket::AppCommand::Optimal(options),
            Commands::Compare(options) => agromarket::AppCommand::Compare(options),
            Commands::Forecast(options) => agromarket::AppCommand::Forecast(options),
            Commands::Analysis(options) => agromarket::AppCommand::Analysis(options),
            Commands::Export(options) => agromarket::AppCommand::Export(options),
            Commands::Categories => agromarket::AppCommand::Categories,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Log in and store the session
    Login {
        #[arg(short, long)]
        username: String,
        /// Prompted for when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// End the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Show the home dashboard for your role
    Dashboard,
    /// List market prices with filters and pagination
    Prices(ListingOptions),
    /// Cheapest market per product
    Optimal(FilterOptions),
    /// Compare one product's prices across markets
    Compare(ProductOptions),
    /// Indicative regional price forecast for one product
    Forecast(ProductOptions),
    /// Price extremes, most quoted products and volume by region
    Analysis(AnalysisOptions),
    /// Export the filtered prices as CSV or a text report
    Export(ExportOptions),
    /// List product categories
    Categories,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => agromarket::cli::setup::setup_at_path(path),
            None => agromarket::cli::setup::setup(),
        },
        Some(cmd) => agromarket::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
