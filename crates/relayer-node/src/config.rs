//! # Node Configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then environment
//! variables, then command-line flags.
//!
//! ## Config File Format
//!
//! ```toml
//! [source]
//! rpc_url = "https://rpc.sepolia.org"
//! contract_address = "0x0000000000000000000000000000000000000000"
//! rpc_timeout_secs = 10
//!
//! [destination]
//! endpoint = "https://api.mock-destination-chain.com/mint"
//! timeout_secs = 10
//!
//! [scan]
//! confirmation_depth = 6
//! poll_interval_secs = 15
//! start_offset = 100
//! max_blocks_per_window = 2000
//! max_concurrent_dispatches = 4
//! max_cycle_retries = 5
//!
//! [retry]
//! max_attempts = 5
//! base_delay_secs = 5
//! max_delay_secs = 60
//!
//! [storage]
//! data_dir = "./data"
//! backend = "file"
//! ```

use anyhow::{bail, Context, Result};
use relayer_core::{Address, EventSchema, RelayerConfig};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable names.
pub mod env {
    /// Source chain JSON-RPC endpoint.
    pub const SOURCE_RPC_URL: &str = "SOURCE_CHAIN_RPC_URL";
    /// Bridge contract address.
    pub const CONTRACT_ADDRESS: &str = "BRIDGE_CONTRACT_ADDRESS";
    /// Destination endpoint.
    pub const DESTINATION_ENDPOINT: &str = "DESTINATION_API_ENDPOINT";
    /// Confirmation depth.
    pub const CONFIRMATION_BLOCKS: &str = "CONFIRMATION_BLOCKS";
    /// Poll interval in seconds.
    pub const POLL_INTERVAL: &str = "POLL_INTERVAL_SECONDS";
    /// Attempts per read or dispatch.
    pub const MAX_RETRY_ATTEMPTS: &str = "MAX_RETRY_ATTEMPTS";
    /// Backoff base delay in seconds.
    pub const RETRY_DELAY: &str = "RETRY_DELAY_SECONDS";
    /// Backoff cap in seconds.
    pub const RETRY_DELAY_CAP: &str = "RETRY_DELAY_CAP_SECONDS";
    /// Data directory for cursor and dead-letters.
    pub const DATA_DIR: &str = "RELAYER_DATA_DIR";
}

/// Cursor storage backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON cursor file with atomic rename.
    #[default]
    File,
    /// RocksDB (requires the `rocksdb` feature).
    Rocksdb,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "rocksdb" => Ok(Self::Rocksdb),
            other => bail!("unknown storage backend {:?} (expected file or rocksdb)", other),
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    source: SourceSection,
    #[serde(default)]
    destination: DestinationSection,
    #[serde(default)]
    scan: ScanSection,
    #[serde(default)]
    retry: RetrySection,
    #[serde(default)]
    storage: StorageSection,
    #[serde(default)]
    event: Option<EventSchema>,
}

#[derive(Debug, Default, Deserialize)]
struct SourceSection {
    rpc_url: Option<String>,
    contract_address: Option<String>,
    rpc_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DestinationSection {
    endpoint: Option<String>,
    timeout_secs: Option<u64>,
    event_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ScanSection {
    confirmation_depth: Option<u64>,
    poll_interval_secs: Option<u64>,
    start_offset: Option<u64>,
    max_blocks_per_window: Option<u64>,
    max_concurrent_dispatches: Option<usize>,
    max_cycle_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RetrySection {
    max_attempts: Option<u32>,
    base_delay_secs: Option<u64>,
    max_delay_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct StorageSection {
    data_dir: Option<PathBuf>,
    backend: Option<StorageBackend>,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Values given on the command line. Highest precedence.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    /// Source chain JSON-RPC endpoint.
    pub source_rpc_url: Option<String>,
    /// Bridge contract address.
    pub contract_address: Option<String>,
    /// Destination endpoint.
    pub destination_endpoint: Option<String>,
    /// Confirmation depth.
    pub confirmation_depth: Option<u64>,
    /// Data directory.
    pub data_dir: Option<PathBuf>,
    /// Cursor storage backend.
    pub storage: Option<StorageBackend>,
}

/// Fully resolved node settings.
#[derive(Debug, Clone)]
pub struct NodeSettings {
    /// Relayer configuration, validated.
    pub relayer: RelayerConfig,
    /// Directory for the cursor and the dead-letter log.
    pub data_dir: PathBuf,
    /// Cursor storage backend.
    pub storage: StorageBackend,
}

impl NodeSettings {
    /// Dead-letter log file name.
    pub const DEAD_LETTER_FILE: &'static str = "dead_letters.jsonl";

    /// Load from an optional file plus the process environment.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let file = match path {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };
        Self::resolve(file, |name| std::env::var(name).ok(), overrides)
    }

    /// Merge file, environment (via `lookup`) and overrides over defaults.
    pub fn resolve<F>(file: ConfigFile, lookup: F, overrides: &Overrides) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = RelayerConfig::default();
        let mut data_dir = PathBuf::from("./data");
        let mut storage = StorageBackend::default();

        // File
        let ConfigFile {
            source,
            destination,
            scan,
            retry,
            storage: storage_section,
            event,
        } = file;

        if let Some(url) = source.rpc_url {
            config.source_endpoint = url;
        }
        if let Some(address) = source.contract_address {
            config.contract_address = parse_address(&address)?;
        }
        if let Some(secs) = source.rpc_timeout_secs {
            config.rpc_timeout = Duration::from_secs(secs);
        }
        if let Some(endpoint) = destination.endpoint {
            config.destination_endpoint = endpoint;
        }
        if let Some(secs) = destination.timeout_secs {
            config.dispatch_timeout = Duration::from_secs(secs);
        }
        if let Some(event_type) = destination.event_type {
            config.event_type = event_type;
        }
        if let Some(depth) = scan.confirmation_depth {
            config.confirmation_depth = depth;
        }
        if let Some(secs) = scan.poll_interval_secs {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(offset) = scan.start_offset {
            config.start_offset = offset;
        }
        if let Some(span) = scan.max_blocks_per_window {
            config.max_blocks_per_window = span;
        }
        if let Some(n) = scan.max_concurrent_dispatches {
            config.max_concurrent_dispatches = n;
        }
        if let Some(n) = scan.max_cycle_retries {
            config.max_cycle_retries = n;
        }
        if let Some(n) = retry.max_attempts {
            config.retry.max_attempts = n;
        }
        if let Some(secs) = retry.base_delay_secs {
            config.retry.base_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = retry.max_delay_secs {
            config.retry.max_delay = Duration::from_secs(secs);
        }
        if let Some(schema) = event {
            config.event_schema = schema;
        }
        if let Some(dir) = storage_section.data_dir {
            data_dir = dir;
        }
        if let Some(backend) = storage_section.backend {
            storage = backend;
        }

        // Environment
        if let Some(url) = lookup(env::SOURCE_RPC_URL) {
            config.source_endpoint = url;
        }
        if let Some(address) = lookup(env::CONTRACT_ADDRESS) {
            config.contract_address = parse_address(&address)
                .with_context(|| format!("invalid {}", env::CONTRACT_ADDRESS))?;
        }
        if let Some(endpoint) = lookup(env::DESTINATION_ENDPOINT) {
            config.destination_endpoint = endpoint;
        }
        if let Some(depth) = parse_env(&lookup, env::CONFIRMATION_BLOCKS)? {
            config.confirmation_depth = depth;
        }
        if let Some(secs) = parse_env(&lookup, env::POLL_INTERVAL)? {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(n) = parse_env(&lookup, env::MAX_RETRY_ATTEMPTS)? {
            config.retry.max_attempts = n;
        }
        if let Some(secs) = parse_env(&lookup, env::RETRY_DELAY)? {
            config.retry.base_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_env(&lookup, env::RETRY_DELAY_CAP)? {
            config.retry.max_delay = Duration::from_secs(secs);
        }
        if let Some(dir) = lookup(env::DATA_DIR) {
            data_dir = PathBuf::from(dir);
        }

        // Command line
        if let Some(url) = &overrides.source_rpc_url {
            config.source_endpoint = url.clone();
        }
        if let Some(address) = &overrides.contract_address {
            config.contract_address =
                parse_address(address).context("invalid --contract-address")?;
        }
        if let Some(endpoint) = &overrides.destination_endpoint {
            config.destination_endpoint = endpoint.clone();
        }
        if let Some(depth) = overrides.confirmation_depth {
            config.confirmation_depth = depth;
        }
        if let Some(dir) = &overrides.data_dir {
            data_dir = dir.clone();
        }
        if let Some(backend) = overrides.storage {
            storage = backend;
        }

        config.validate().context("invalid relayer configuration")?;

        Ok(Self {
            relayer: config,
            data_dir,
            storage,
        })
    }

    /// Path of the dead-letter log.
    pub fn dead_letter_path(&self) -> PathBuf {
        self.data_dir.join(Self::DEAD_LETTER_FILE)
    }
}

fn parse_env<F, T>(lookup: &F, name: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => match raw.trim().parse() {
            Ok(value) => Ok(Some(value)),
            Err(e) => bail!("invalid {}={:?}: {}", name, raw, e),
        },
    }
}

/// Parse a `0x`-prefixed 20-byte hex address.
pub fn parse_address(value: &str) -> Result<Address> {
    let trimmed = value.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(digits).with_context(|| format!("address {:?} is not hex", value))?;
    match <Address>::try_from(bytes.as_slice()) {
        Ok(address) => Ok(address),
        Err(_) => bail!("address {:?} must be 20 bytes, got {}", value, bytes.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let settings =
            NodeSettings::resolve(ConfigFile::default(), no_env, &Overrides::default()).unwrap();

        assert_eq!(settings.relayer.confirmation_depth, 6);
        assert_eq!(settings.relayer.poll_interval, Duration::from_secs(15));
        assert_eq!(settings.storage, StorageBackend::File);
        assert_eq!(
            settings.dead_letter_path(),
            PathBuf::from("./data/dead_letters.jsonl")
        );
    }

    #[test]
    fn test_file_values_applied() {
        let file = ConfigFile::parse(
            r#"
            [source]
            rpc_url = "http://localhost:8545"
            contract_address = "0x1111111111111111111111111111111111111111"

            [scan]
            confirmation_depth = 12
            max_blocks_per_window = 500

            [retry]
            max_attempts = 7
            base_delay_secs = 2
            max_delay_secs = 30

            [storage]
            data_dir = "/var/lib/relayer"
            backend = "rocksdb"
            "#,
        )
        .unwrap();

        let settings = NodeSettings::resolve(file, no_env, &Overrides::default()).unwrap();
        let config = &settings.relayer;
        assert_eq!(config.source_endpoint, "http://localhost:8545");
        assert_eq!(config.contract_address, [0x11; 20]);
        assert_eq!(config.confirmation_depth, 12);
        assert_eq!(config.max_blocks_per_window, 500);
        assert_eq!(config.retry.max_attempts, 7);
        assert_eq!(config.retry.base_delay, Duration::from_secs(2));
        assert_eq!(settings.data_dir, PathBuf::from("/var/lib/relayer"));
        assert_eq!(settings.storage, StorageBackend::Rocksdb);
    }

    #[test]
    fn test_env_overrides_file_and_flags_override_env() {
        let file = ConfigFile::parse("[scan]\nconfirmation_depth = 12\n").unwrap();
        let env = env_of(&[
            (env::CONFIRMATION_BLOCKS, "20"),
            (env::POLL_INTERVAL, "3"),
            (env::DESTINATION_ENDPOINT, "http://env/mint"),
        ]);
        let overrides = Overrides {
            confirmation_depth: Some(30),
            ..Default::default()
        };

        let settings = NodeSettings::resolve(file, env, &overrides).unwrap();
        assert_eq!(settings.relayer.confirmation_depth, 30);
        assert_eq!(settings.relayer.poll_interval, Duration::from_secs(3));
        assert_eq!(settings.relayer.destination_endpoint, "http://env/mint");
    }

    #[test]
    fn test_event_schema_from_file() {
        let file = ConfigFile::parse(
            r#"
            [event]
            name = "TokensLocked"
            params = [
                { name = "user", kind = "address", indexed = true },
                { name = "token", kind = "address", indexed = true },
                { name = "amount", kind = "uint256" },
                { name = "destinationChainId", kind = "bytes32", indexed = true },
                { name = "recipient", kind = "address" },
            ]
            "#,
        )
        .unwrap();

        let settings = NodeSettings::resolve(file, no_env, &Overrides::default()).unwrap();
        assert_eq!(settings.relayer.event_schema, EventSchema::tokens_locked());
    }

    #[test]
    fn test_invalid_env_number_rejected() {
        let env = env_of(&[(env::MAX_RETRY_ATTEMPTS, "many")]);
        let err = NodeSettings::resolve(ConfigFile::default(), env, &Overrides::default())
            .unwrap_err();
        assert!(err.to_string().contains(env::MAX_RETRY_ATTEMPTS));
    }

    #[test]
    fn test_zero_depth_rejected() {
        let env = env_of(&[(env::CONFIRMATION_BLOCKS, "0")]);
        assert!(NodeSettings::resolve(ConfigFile::default(), env, &Overrides::default()).is_err());
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(
            parse_address("0x2222222222222222222222222222222222222222").unwrap(),
            [0x22; 20]
        );
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("0xnothex").is_err());
    }

    #[test]
    fn test_storage_backend_from_str() {
        assert_eq!("ROCKSDB".parse::<StorageBackend>().unwrap(), StorageBackend::Rocksdb);
        assert!("sqlite".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let err = ConfigFile::load(Path::new("/nonexistent/relayer.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/relayer.toml"));
    }
}
