pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::cli::analysis::AnalysisOptions;
use crate::cli::export::ExportOptions;
use crate::cli::{FilterOptions, ListingOptions, ProductOptions};
use crate::core::config::AppConfig;
use crate::core::market::MarketDataProvider;
use crate::core::session::Session;
use crate::providers::{AgroApiClient, ApiError};
use crate::store::{FileTokenStore, TokenStore};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Commands that talk to the market API. `setup` is handled by the binary.
#[derive(Debug, Clone)]
pub enum AppCommand {
    Login {
        username: String,
        password: Option<String>,
    },
    Logout,
    Whoami,
    Dashboard,
    Prices(ListingOptions),
    Optimal(FilterOptions),
    Compare(ProductOptions),
    Forecast(ProductOptions),
    Analysis(AnalysisOptions),
    Export(ExportOptions),
    Categories,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("AgroMarket starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let tokens: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(config.session_file()?));
    let client = AgroApiClient::new(&config.api.base_url, tokens)?;
    let market: &dyn MarketDataProvider = &client;
    let mut session = match &command {
        // Logging out only removes local state and never waits on the server.
        AppCommand::Logout => Session::anonymous(),
        AppCommand::Login { .. } => client.resume_session().await.unwrap_or_else(|e| {
            warn!(error = %e, "Could not resume the stored session");
            Session::anonymous()
        }),
        _ => client.resume_session().await?,
    };

    let result = match command {
        AppCommand::Login { username, password } => {
            cli::auth::login(&client, &mut session, &username, password).await
        }
        AppCommand::Logout => cli::auth::logout(&client, &mut session).await,
        AppCommand::Whoami => cli::auth::whoami(&session),
        AppCommand::Dashboard => cli::dashboard::run(&client, market, &session).await,
        AppCommand::Prices(options) => {
            cli::prices::run(market, &session, &options, config.page_size()?).await
        }
        AppCommand::Optimal(options) => cli::optimal::run(market, &session, &options).await,
        AppCommand::Compare(options) => cli::compare::run(market, &session, &options).await,
        AppCommand::Forecast(options) => cli::forecast::run(market, &session, &options).await,
        AppCommand::Analysis(options) => cli::analysis::run(market, &session, &options).await,
        AppCommand::Export(options) => {
            let export_dir = config.export_dir.as_ref().map(PathBuf::from);
            cli::export::run(
                market,
                &session,
                &options,
                export_dir.as_deref(),
                config.report_title(),
            )
            .await
        }
        AppCommand::Categories => cli::categories::run(&client, &session).await,
    };

    if result
        .as_ref()
        .is_err_and(|e| matches!(e.downcast_ref::<ApiError>(), Some(ApiError::SessionExpired)))
    {
        session.token_expired();
        warn!(
            reason = session.last_error().unwrap_or_default(),
            "Stored session discarded"
        );
    }
    result
}
