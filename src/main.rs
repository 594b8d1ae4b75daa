// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
#![deny(elided_lifetimes_in_paths)]
#![warn(
    rust_2018_idioms,
    future_incompatible,
    unused,
    unused_lifetimes,
    unused_qualifications,
    unused_results,
    anonymous_parameters,
    deprecated_in_future,
    elided_lifetimes_in_paths,
    explicit_outlives_requirements,
    keyword_idents,
    macro_use_extern_crate,
    missing_doc_code_examples,
    private_doc_tests,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::unseparated_literal_suffix,
    clippy::decimal_literal_representation,
    clippy::single_char_lifetime_names,
    clippy::fallible_impl_from,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::wildcard_enum_match_arm,
    clippy::deref_by_slicing,
    clippy::default_numeric_fallback,
    clippy::shadow_reuse,
    clippy::clone_on_ref_ptr,
    clippy::todo,
    clippy::string_add,
    clippy::use_debug,
    clippy::future_not_send
)]
#![cfg_attr(not(test), warn(clippy::panic_in_result_fn))]

mod allow_list;
mod backend;
mod collection;
mod command;
mod config;
mod error;
mod gate;
mod metadata;
mod model;
mod password;
mod preference;
mod storage;

use std::{convert::Infallible, path::PathBuf, process, sync::Arc};

use async_trait::async_trait;
use backend::{supabase::Supabase, Backend};
use clap::{Parser, Subcommand};
use config::Config;
use error::Result;
use gate::AccessGate;
use log::{debug, error, info, warn};
use preference::RememberPreference;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use storage::Storage;
use url::Url;

#[derive(Debug, Subcommand)]
enum Command {
    Login(command::login::Command),
    Logout(command::logout::Command),
    Status(command::status::Command),
    Dashboard(command::dashboard::Command),
    #[command(subcommand)]
    Jobs(command::jobs::Command),
    #[command(subcommand)]
    Candidates(command::candidates::Command),
    #[command(subcommand)]
    Clients(command::clients::Command),
    #[command(subcommand)]
    Invoices(command::invoices::Command),
    #[command(subcommand)]
    Documents(command::documents::Command),
    #[command(subcommand)]
    Diary(command::diary::Command),
}

#[async_trait(?Send)]
impl command::Command for Command {
    async fn execute<B: Backend, S: Storage<RememberPreference>>(
        self,
        context: &mut command::Context<B, S>,
    ) -> Result<()> {
        match self {
            Self::Login(cmd) => cmd.execute(context).await,
            Self::Logout(cmd) => cmd.execute(context).await,
            Self::Status(cmd) => cmd.execute(context).await,
            Self::Dashboard(cmd) => cmd.execute(context).await,
            Self::Jobs(cmd) => cmd.execute(context).await,
            Self::Candidates(cmd) => cmd.execute(context).await,
            Self::Clients(cmd) => cmd.execute(context).await,
            Self::Invoices(cmd) => cmd.execute(context).await,
            Self::Documents(cmd) => cmd.execute(context).await,
            Self::Diary(cmd) => cmd.execute(context).await,
        }
    }
}

fn parse_secret(value: &str) -> Result<SecretString, Infallible> {
    Ok(SecretString::new(value.to_owned()))
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// The URL of the hosted backend project. Without it, nobody can sign
    /// in.
    #[arg(long, env = "NEXUS_URL", value_parser = Url::parse)]
    url: Option<Url>,

    /// The public API key of the backend project.
    #[arg(long, env = "NEXUS_API_KEY", hide_env_values = true, value_parser = parse_secret)]
    api_key: Option<SecretString>,

    /// An email address that may use the dashboard. Repeat the option, or
    /// separate addresses with commas, to allow several.
    #[arg(
        long = "allowed-email",
        env = "NEXUS_ALLOWED_EMAILS",
        value_delimiter = ','
    )]
    allowed_emails: Vec<String>,

    /// Turn off storing the session between runs.
    #[arg(long)]
    no_cache_session: bool,

    /// The path to the Pinentry program to use when asking for a password.
    #[arg(long, value_hint = clap::ValueHint::ExecutablePath)]
    pinentry_program: Option<PathBuf>,

    /// Sign in with this address before running the command. The session
    /// ends when the command finishes.
    #[arg(long)]
    email: Option<String>,

    #[clap(subcommand)]
    command: Command,
}

async fn get_session_storage<
    T: Send + Serialize + Sync + for<'de> Deserialize<'de> + Clone + 'static,
>(
    args: &Args,
    url: &Url,
) -> Box<dyn Storage<T>> {
    if !args.no_cache_session {
        #[cfg(feature = "secret-service")]
        match storage::SecretService::new(url, "session").await {
            Ok(secret_service_storage) => return Box::new(secret_service_storage),
            Err(e) => {
                warn!("We need to fall back to unencrypted file storage because we can't connect to the secret service: {}", e);
            }
        }

        #[cfg(feature = "keychain")]
        match storage::Keychain::new(url, "session") {
            Ok(keychain_storage) => return Box::new(keychain_storage),
            Err(e) => {
                warn!("We need to fall back to unencrypted file storage because we can't connect to Keychain: {}", e);
            }
        }

        if let Some(file_storage) = storage::File::new("session.json") {
            return Box::new(file_storage);
        }
        warn!("There is nowhere to store the session, so it will end with this command");
    } else {
        debug!("Not storing the session for {}", url);
    }

    Box::new(storage::Memory::<T>::new())
}

fn get_preference_storage(args: &Args) -> Box<dyn Storage<RememberPreference>> {
    if !args.no_cache_session {
        if let Some(file_storage) = storage::File::new("remember-me.json") {
            return Box::new(file_storage);
        }
    }

    Box::new(storage::Memory::new())
}

async fn run(args: Args) -> Result<()> {
    let config = Config::new(args.url.clone(), args.api_key.clone(), &args.allowed_emails)?;

    let prompt: Vec<Box<dyn password::Prompt>> = vec![
        Box::new(args.pinentry_program.clone().map_or_else(
            password::PinentryPrompt::new,
            password::PinentryPrompt::new_with_executable,
        )),
        Box::new(password::RpasswordPrompt),
    ];

    let preference = get_preference_storage(&args);
    let (gate, backend) = match config.backend {
        Some(backend_config) => {
            let session_storage = get_session_storage(&args, &backend_config.url).await;
            let backend = Arc::new(Supabase::new(backend_config, session_storage)?);
            (
                AccessGate::new(Arc::clone(&backend), config.allow_list, preference),
                Some(backend),
            )
        }
        None => (
            AccessGate::unconfigured(config.allow_list, preference),
            None,
        ),
    };

    let mut context = command::Context::new(gate, backend, Box::new(prompt));
    let state = context.gate.initialize().await;
    info!("Access: {}", state);

    let mut result = Ok(());
    if let Some(email) = args.email.as_deref() {
        result = command::login::sign_in(&mut context, email, false)
            .await
            .map(|_| ());
    }
    if result.is_ok() {
        result = command::Command::execute(args.command, &mut context).await;
    }

    context.close().await;
    result
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let dotenv = dotenvy::dotenv();

    let logger_env = env_logger::Env::new()
        .filter_or("NEXUS_LOG", "warn")
        .write_style("NEXUS_LOG_STYLE");
    env_logger::Builder::from_env(logger_env).init();

    match dotenv {
        Ok(path) => debug!("Loaded settings from {}", path.display()),
        Err(e) => debug!("No settings file was loaded: {}", e),
    }

    if let Err(e) = run(Args::parse()).await {
        error!("We encountered an error: {}", e);
        process::exit(1);
    };
}
