//! Maintenance commands for the harvest coordination database.
//!
//! Run as `fruitshare <command>`; exits 0 on success, 1 on usage errors and
//! 2 when a command fails partway.

use fruitshare::{
    cache::ViewCache,
    config::{AppConfig, database::create_connection},
    core::{auth::Principal, harvest, member, participation, property},
    entities::Role,
    errors::Result,
};
use std::process::ExitCode;
use tracing::{error, info};

const USAGE: &str = "usage: fruitshare <command>

commands:
  reset-authorizations   forget last season's owner consents
  sweep-obsolete         mark stale participation requests obsolete
  cleanup-harvest-dates  backfill missing harvest dates
  export-emails          write the newsletter email list";

async fn run(command: &str) -> Result<()> {
    let config = AppConfig::from_env()?;
    let db = create_connection().await?;
    let cache = ViewCache::new();
    // Maintenance runs with full rights
    let principal = Principal::new(0, vec![Role::Admin]);

    match command {
        "reset-authorizations" => {
            let reset = property::reset_authorizations(&db, &cache, &principal).await?;
            info!(reset, "authorizations cleared");
        }
        "sweep-obsolete" => {
            let swept = participation::sweep_obsolete(&db).await?;
            info!(swept, "requests swept");
        }
        "cleanup-harvest-dates" => {
            let repaired = harvest::cleanup_dates(&db).await?;
            info!(repaired, "dates repaired");
        }
        "export-emails" => {
            let count =
                member::export_email_list(&db, &principal, &config.email_list_path).await?;
            info!(count, path = %config.email_list_path.display(), "email list written");
        }
        other => {
            return Err(fruitshare::errors::Error::Config {
                message: format!("unknown command: {other}"),
            });
        }
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1) else {
        eprintln!("{USAGE}");
        return ExitCode::from(1);
    };
    if args.len() > 2 {
        eprintln!("{USAGE}");
        return ExitCode::from(1);
    }

    match run(command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(fruitshare::errors::Error::Config { message }) => {
            eprintln!("{message}\n\n{USAGE}");
            ExitCode::from(1)
        }
        Err(e) => {
            error!(error = %e, "command failed");
            ExitCode::from(2)
        }
    }
}
