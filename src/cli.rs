// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines the global connection options and the subcommands.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "reglist")]
#[command(about = "List repositories and tags on a container image registry")]
#[command(version)]
pub struct Cli {
    /// Registry address: [scheme://]host[:port][/path], scheme one of tcp, http, https, unix
    #[arg(short, long, global = true)]
    pub registry: Option<String>,

    /// Configuration file (defaults to reglist.yml in the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Dial timeout, e.g. "10s" or "500ms"
    #[arg(long, global = true, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Use TLS for scheme-less and tcp:// addresses
    #[arg(long, global = true)]
    pub tls: bool,

    /// Additional CA bundle (PEM) to trust; implies --tls
    #[arg(long, global = true)]
    pub tls_ca: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List repositories in the registry catalog
    Catalog,

    /// List tags of a repository
    Tags {
        /// Repository name, e.g. library/alpine
        name: String,
    },

    /// Issue a raw GET request and write the response body to stdout
    Get {
        /// Request path, e.g. /v2/
        path: String,

        /// Docker config.json to take credentials from
        #[arg(long)]
        auth_file: Option<PathBuf>,
    },
}
