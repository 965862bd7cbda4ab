use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use dotenvy::dotenv;

use crate::services::report::TemplateSource;

pub const DEFAULT_TITLE: &str = "Dataset Analysis Report";

fn default_max_file_size() -> usize {
    // 10 MB in bytes
    10 * 1024 * 1024
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub max_file_size: usize,
    pub template_path: Option<PathBuf>,
    pub report_title: String,
    pub sample_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 5000,
            max_file_size: default_max_file_size(),
            template_path: None,
            report_title: DEFAULT_TITLE.to_string(),
            sample_seed: None,
        }
    }
}

impl Config {
    pub fn new() -> Result<Self> {
        // Load .env file first
        dotenv().ok();

        let defaults = Config::default();
        Ok(Config {
            host: parse_var("HOST")?.unwrap_or(defaults.host),
            port: parse_var("PORT")?.unwrap_or(defaults.port),
            max_file_size: parse_var("MAX_FILE_SIZE")?.unwrap_or(defaults.max_file_size),
            template_path: std::env::var("REPORT_TEMPLATE_PATH").ok().map(PathBuf::from),
            report_title: std::env::var("REPORT_TITLE").unwrap_or(defaults.report_title),
            sample_seed: parse_var("REPORT_SAMPLE_SEED")?,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Template used when a request does not upload its own.
    pub fn default_template(&self) -> TemplateSource {
        match &self.template_path {
            Some(path) => TemplateSource::File(path.clone()),
            None => TemplateSource::Builtin,
        }
    }
}

pub fn load_config() -> Result<Config> {
    let config = Config::new()?;
    tracing::info!(
        "Configuration loaded: addr={}, max_file_size={}KB, template={:?}",
        config.socket_addr(),
        config.max_file_size / 1024,
        config.template_path
    );
    Ok(config)
}

fn parse_var<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", key, e)),
        _ => Ok(None),
    }
}
