//! `mailsweep` - delete mail from chosen senders in an Outlook mailbox
//!
//! Signs in with `OAuth2`, finds matching messages over IMAP, and flags them
//! `\Deleted` in batches, reconnecting when the server drops the link.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;
mod config;
mod logging;

use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use mailsweep_core::{
    ConfiguredProvider, SearchEngine, SweepOptions, TokenCache, TokenProvider, sweep,
};
use mailsweep_imap::{Session, SessionConfig, TlsEndpoint};
use tracing::{info, warn};

use cli::Args;
use config::{Config, ConfigError};

const EXIT_FAILURE: u8 = 1;
const EXIT_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose);

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[ERROR] {e:#}");
            if e.downcast_ref::<ConfigError>().is_some() {
                ExitCode::from(EXIT_CONFIG)
            } else {
                ExitCode::from(EXIT_FAILURE)
            }
        }
    }
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let mut config = Config::load(&args.config)?;
    config.apply_overrides(args.dry_run, args.force_login);

    let cache = TokenCache::default_location()
        .inspect_err(|e| warn!(error = %e, "token cache disabled"))
        .ok();
    let provider = ConfiguredProvider::resolve(&config.token_settings(), cache)
        .context("could not set up sign-in")?;

    let credential = match provider.acquire_token(&config.email).await {
        Ok(credential) => credential,
        Err(e) if matches!(provider, ConfiguredProvider::Unconfigured(_)) => {
            return Err(ConfigError::Invalid {
                key: "oauth2.client_id",
                reason: format!("must be configured ({e})"),
            }
            .into());
        }
        Err(e) => return Err(e).context("sign-in failed"),
    };

    let endpoint = TlsEndpoint::new(config.imap.server.trim()).port(config.imap.port);
    let session_config = SessionConfig::default()
        .mailbox(config.mailbox())
        .auth_mode(config.auth_mode()?)
        .connect_timeout(config.connect_timeout())
        .command_timeout(config.command_timeout());

    info!(server = %config.imap.server, mailbox = config.mailbox(), "connecting");
    let mut session = Session::open(endpoint, credential, session_config)
        .await
        .with_context(|| format!("could not open '{}' on {}", config.mailbox(), config.imap.server))?;

    let options = SweepOptions {
        delete: config.cleaning.move_to_deleted,
        batch_size: config.cleaning.batch_size,
    };

    let mut out = io::stdout();
    let mut search = SearchEngine::new();
    let mut result = Ok(());
    for predicate in config.predicates() {
        let predicate = predicate.as_ref();
        if let Err(e) = sweep(&mut session, &mut search, predicate, options, &mut out).await {
            result = Err(e).context("could not write results");
            break;
        }
    }

    session.close().await;
    info!(reconnects = session.reconnects(), "done");
    result
}
