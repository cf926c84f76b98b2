use clap::Parser;
use std::path::PathBuf;

use crate::constants::{MODEL_FILE_NAME, MODEL_PATH};
use crate::data::yahoo::DEFAULT_YAHOO_BASE_URL;

/// Server settings, from flags or `STOCKS_GURU_*` environment variables
#[derive(Debug, Clone, Parser)]
#[command(name = "stocks-guru", version, about = "LSTM stock price forecasting over HTTP")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "STOCKS_GURU_BIND", default_value = "0.0.0.0:5000")]
    pub bind: String,

    /// Prefix for the /stocks routes, e.g. /stocks-guru
    #[arg(long, env = "STOCKS_GURU_BASE_ROUTE", default_value = "")]
    pub base_route: String,

    /// Root directory of the versioned model store
    #[arg(long, env = "STOCKS_GURU_MODEL_DIR", default_value = MODEL_PATH)]
    pub model_dir: PathBuf,

    /// Artifact name of the persisted model
    #[arg(long, env = "STOCKS_GURU_MODEL_NAME", default_value = MODEL_FILE_NAME)]
    pub model_name: String,

    /// CSV file backing stored prices; in-memory when unset
    #[arg(long, env = "STOCKS_GURU_PRICE_STORE")]
    pub price_store: Option<PathBuf>,

    /// Yahoo Finance API root
    #[arg(long, env = "STOCKS_GURU_YAHOO_BASE_URL", default_value = DEFAULT_YAHOO_BASE_URL)]
    pub yahoo_base_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::try_parse_from(["stocks-guru"]).unwrap();
        assert_eq!(config.model_name, MODEL_FILE_NAME);
        assert_eq!(config.model_dir, PathBuf::from(MODEL_PATH));
        assert_eq!(config.yahoo_base_url, DEFAULT_YAHOO_BASE_URL);
    }

    #[test]
    fn test_flags_override() {
        let config = ServerConfig::try_parse_from([
            "stocks-guru",
            "--bind",
            "127.0.0.1:8080",
            "--base-route",
            "/stocks-guru",
            "--price-store",
            "data/prices.csv",
        ])
        .unwrap();
        assert_eq!(config.bind, "127.0.0.1:8080");
        assert_eq!(config.base_route, "/stocks-guru");
        assert_eq!(config.price_store, Some(PathBuf::from("data/prices.csv")));
    }
}
