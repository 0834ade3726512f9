// ABOUTME: Entry point for the reglist CLI application.
// ABOUTME: Resolves configuration, builds a client and dispatches the subcommand.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use reglist::Client;
use reglist::client::Method;
use reglist::config::Config;
use reglist::error::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::env;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so listings on stdout stay pipeable
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let registry = match &cli.registry {
        Some(registry) => registry.clone(),
        None => config.registry()?.to_string(),
    };
    let client = Client::with_config(&registry, config.client_config()?)?;

    match cli.command {
        Commands::Catalog => {
            let repositories = client.catalog().await?;
            if cli.json {
                print_json(&repositories)
            } else {
                for name in &repositories.repositories {
                    println!("{name}");
                }
                Ok(())
            }
        }
        Commands::Tags { name } => {
            let tags = client.tags(&name).await?;
            if cli.json {
                print_json(&tags)
            } else {
                for tag in &tags.tags {
                    println!("{tag}");
                }
                Ok(())
            }
        }
        Commands::Get { path, auth_file } => {
            let mut config = config;
            if auth_file.is_some() {
                config.auth_file = auth_file;
            }
            let headers = authorization_headers(&config, &registry)?;
            raw_get(&client, &path, headers.as_ref()).await
        }
    }
}

/// Load the config file (explicit or discovered) and apply CLI overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => match Config::discover(&env::current_dir()?) {
            Ok(config) => config,
            Err(Error::ConfigNotFound(_)) => Config::default(),
            Err(e) => return Err(e),
        },
    };

    if let Some(timeout) = cli.timeout {
        if timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }
        config.timeout = timeout;
    }
    if cli.tls {
        config.tls.enabled = true;
    }
    if let Some(ca_file) = &cli.tls_ca {
        config.tls.ca_file = Some(ca_file.clone());
    }

    Ok(config)
}

fn authorization_headers(
    config: &Config,
    registry: &str,
) -> Result<Option<HashMap<String, String>>> {
    let auths = config.auth_configs()?;
    let Some(auth) = auths.find(registry) else {
        return Ok(None);
    };
    Ok(auth.authorization_header()?.map(|value| {
        tracing::debug!("using stored credentials for {}", registry);
        HashMap::from([("Authorization".to_string(), value)])
    }))
}

async fn raw_get(
    client: &Client,
    path: &str,
    headers: Option<&HashMap<String, String>>,
) -> Result<()> {
    let mut body = client.stream_request(Method::GET, path, None, headers).await?;
    let mut stdout = tokio::io::stdout();
    while let Some(chunk) = body.chunk().await? {
        stdout.write_all(&chunk).await?;
    }
    stdout.flush().await?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
