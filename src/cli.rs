use std::{path::PathBuf, time::Duration};

use clap::Parser;

use crate::{Scope, TransportConfig};

/// Dump album listings of the topschool parent portal as JSON
#[derive(Parser, Debug)]
#[command(name = "albumscrap", version, about, long_about = None)]
pub struct Cli {
    /// Portal account
    #[arg(long, env = "USERNAME")]
    pub username: String,

    /// Portal password. Not needed when a cookie file provides the session.
    #[arg(long, env = "PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Reuse a session: file with one `Set-Cookie` value per line
    #[arg(long, value_name = "FILE")]
    pub cookie_file: Option<PathBuf>,

    /// Album collection to read
    #[arg(long, value_enum, default_value_t = Scope::Class)]
    pub scope: Scope,

    /// Dump the photos of this album instead of the album listing
    #[arg(long, value_name = "ID")]
    pub album_id: Option<u64>,

    /// Follow the pagination and fetch every page
    #[arg(long)]
    pub all: bool,

    /// Page to fetch when not using --all
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Output file. Defaults to albums.json or photos.json.
    #[arg(long, short, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,
}

impl Cli {
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.timeout_secs.map(Duration::from_secs),
            ..TransportConfig::default()
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| match self.album_id {
            Some(_) => PathBuf::from("photos.json"),
            None => PathBuf::from("albums.json"),
        })
    }
}
