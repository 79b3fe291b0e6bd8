use std::fs;
use std::path::Path;

use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::DeckError;
use crate::query::{DEFAULT_LIMIT, MAX_LIMIT};

pub static CONFIG: OnceCell<Config> = OnceCell::new();

const ENV_PREFIX: &str = "NFTDECK_";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub nftdeck: String,
    pub reqwest: String,
}

impl LoggingConfig {
    const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];
    const NFTDECK_LEVEL: &str = "info";
    const REQWEST_LEVEL: &str = "warn";

    fn default() -> Self {
        LoggingConfig {
            nftdeck: Self::NFTDECK_LEVEL.to_string(),
            reqwest: Self::REQWEST_LEVEL.to_string(),
        }
    }

    fn ensure_valid(&mut self) {
        Self::ensure_level(&mut self.nftdeck, "nftdeck", Self::NFTDECK_LEVEL);
        Self::ensure_level(&mut self.reqwest, "reqwest", Self::REQWEST_LEVEL);
    }

    fn ensure_level(level: &mut String, name: &str, default: &str) {
        let str_original = level.clone();
        *level = level.trim().to_ascii_lowercase();
        if !Self::LOG_LEVELS.contains(&level.as_str()) {
            eprintln!(
                "Config error: {} log level of '{}' is invalid - using default of '{}'",
                name, str_original, default
            );
            *level = default.to_owned();
        }
    }

    /// flexi_logger spec string, e.g. `nftdeck=info, reqwest=warn`.
    pub fn log_spec(&self) -> String {
        format!("nftdeck={}, reqwest={}", self.nftdeck, self.reqwest)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
    /// Bearer token sent with every request when set
    pub token: Option<String>,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub collection_path: String,
    pub market_path: String,
    pub transactions_path: String,
}

impl ApiConfig {
    const BASE_URL: &str = "http://localhost:5000/api/";
    const TIMEOUT_SECS: u64 = 15;
    const CONNECT_TIMEOUT_SECS: u64 = 5;

    fn default() -> Self {
        ApiConfig {
            base_url: Self::BASE_URL.to_owned(),
            token: None,
            timeout_secs: Self::TIMEOUT_SECS,
            connect_timeout_secs: Self::CONNECT_TIMEOUT_SECS,
            collection_path: "nfts/my-collection".to_owned(),
            market_path: "marketplace/listings".to_owned(),
            transactions_path: "transactions/history".to_owned(),
        }
    }

    fn ensure_valid(&mut self) {
        if Url::parse(self.base_url.trim()).is_err() {
            eprintln!(
                "Config error: base_url of '{}' is not a valid URL - using default of '{}'",
                self.base_url,
                Self::BASE_URL
            );
            self.base_url = Self::BASE_URL.to_owned();
        }
        if self.timeout_secs == 0 {
            eprintln!(
                "Config error: timeout_secs must be positive - using default of {}",
                Self::TIMEOUT_SECS
            );
            self.timeout_secs = Self::TIMEOUT_SECS;
        }
        if self.connect_timeout_secs == 0 {
            self.connect_timeout_secs = Self::CONNECT_TIMEOUT_SECS;
        }
        // Blank tokens come from empty environment variables
        if self.token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            self.token = None;
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct QueryConfig {
    pub default_limit: u32,
    /// Total attempts per fetch, including the first one
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl QueryConfig {
    const MAX_ATTEMPTS: u32 = 5;

    fn default() -> Self {
        QueryConfig {
            default_limit: DEFAULT_LIMIT,
            max_attempts: 1,
            retry_delay_ms: 500,
        }
    }

    fn ensure_valid(&mut self) {
        if !(1..=MAX_LIMIT).contains(&self.default_limit) {
            eprintln!(
                "Config error: default_limit of {} is out of range 1..={} - using default of {}",
                self.default_limit, MAX_LIMIT, DEFAULT_LIMIT
            );
            self.default_limit = DEFAULT_LIMIT;
        }
        if !(1..=Self::MAX_ATTEMPTS).contains(&self.max_attempts) {
            let clamped = self.max_attempts.clamp(1, Self::MAX_ATTEMPTS);
            eprintln!(
                "Config error: max_attempts of {} is out of range 1..={} - using {}",
                self.max_attempts,
                Self::MAX_ATTEMPTS,
                clamped
            );
            self.max_attempts = clamped;
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WalletConfig {
    /// Ethereum JSON-RPC endpoint used for account discovery
    pub rpc_url: String,
}

impl WalletConfig {
    const RPC_URL: &str = "http://localhost:8545/";

    fn default() -> Self {
        WalletConfig {
            rpc_url: Self::RPC_URL.to_owned(),
        }
    }

    fn ensure_valid(&mut self) {
        if Url::parse(self.rpc_url.trim()).is_err() {
            eprintln!(
                "Config error: rpc_url of '{}' is not a valid URL - using default of '{}'",
                self.rpc_url,
                Self::RPC_URL
            );
            self.rpc_url = Self::RPC_URL.to_owned();
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub api: ApiConfig,
    pub query: QueryConfig,
    pub wallet: WalletConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api: ApiConfig::default(),
            query: QueryConfig::default(),
            wallet: WalletConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file located in the app's data directory,
    /// overlaid with `NFTDECK_` environment variables.
    /// If the file is missing or fails to parse, defaults are used.
    /// Additionally, writes the default config to disk if no file exists.
    pub fn load_config(project_dirs: &ProjectDirs) -> Self {
        let config_path = project_dirs.data_local_dir().join("config.toml");
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path(config_path: &Path) -> Self {
        let default_config = Config::default();

        // If the config file doesn't exist, write the default configuration to disk.
        if !config_path.exists() {
            Self::write_default(config_path, &default_config);
        }

        // Defaults, then the TOML file, then the environment
        let figment = Figment::from(Serialized::defaults(default_config.clone()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        // Attempt to extract the configuration; on error, log a message and fall back to defaults.
        let mut config: Config = figment.extract().unwrap_or_else(|err| {
            eprintln!(
                "Could not load config file {}: {}. Using default configuration.",
                config_path.display(),
                err
            );
            default_config
        });

        config.ensure_valid();

        config
    }

    fn write_default(config_path: &Path, default_config: &Config) {
        if let Some(parent) = config_path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!(
                    "Failed to create configuration directory {}: {}",
                    parent.display(),
                    e
                );
            }
        }
        match toml::to_string_pretty(default_config) {
            Ok(toml_string) => {
                if let Err(e) = fs::write(config_path, toml_string) {
                    eprintln!(
                        "Failed to write default config to {}: {}",
                        config_path.display(),
                        e
                    );
                }
            }
            Err(_) => eprintln!("Failed to serialize default config."),
        }
    }

    /// Load once and keep for the life of the process.
    pub fn init() -> Result<&'static Config, DeckError> {
        CONFIG.get_or_try_init(|| {
            let project_dirs = ProjectDirs::from("", "", "nftdeck").ok_or_else(|| {
                DeckError::Config("could not determine the configuration directory".into())
            })?;
            Ok(Self::load_config(&project_dirs))
        })
    }

    fn ensure_valid(&mut self) {
        self.api.ensure_valid();
        self.query.ensure_valid();
        self.wallet.ensure_valid();
        self.logging.ensure_valid();
    }
}
