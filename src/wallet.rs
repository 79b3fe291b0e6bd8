use async_trait::async_trait;
use log::{debug, info, Level};
use logging_timer::timer;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use url::Url;

use crate::config::{ApiConfig, WalletConfig};
use crate::error::DeckError;
use crate::utils::Utils;

/// An Ethereum account address, stored lowercase so that checksummed and
/// plain forms compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WalletAddress(String);

impl WalletAddress {
    const HEX_LEN: usize = 40;

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `0x1234…abcd`, for status lines.
    pub fn short(&self) -> String {
        Utils::abbreviate(&self.0, 6)
    }
}

impl FromStr for WalletAddress {
    type Err = DeckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| DeckError::Wallet(format!("Address '{}' must start with 0x", s)))?;

        if digits.len() != Self::HEX_LEN || hex::decode(digits).is_err() {
            return Err(DeckError::Wallet(format!(
                "Address '{}' must be 0x followed by {} hex digits",
                s,
                Self::HEX_LEN
            )));
        }
        Ok(WalletAddress(format!("0x{}", digits.to_ascii_lowercase())))
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for WalletAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

pub type AccountsCallback = Box<dyn Fn(Option<&WalletAddress>) + Send + Sync>;

/// The account source the app authenticates with. Only the address is
/// used; signing is out of scope.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Ask the wallet for access and return the selected account.
    async fn connect(&self) -> Result<WalletAddress, DeckError>;

    /// The account from the last `connect` or poll, if any.
    fn address(&self) -> Option<WalletAddress>;

    /// Register a callback fired whenever the selected account changes,
    /// with `None` when the wallet disconnects.
    fn on_accounts_changed(&self, callback: AccountsCallback);
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Default)]
struct WalletState {
    address: Option<WalletAddress>,
    listeners: Vec<Arc<AccountsCallback>>,
}

/// A wallet reached over Ethereum JSON-RPC on HTTP, such as a local node
/// or a wallet bridge.
pub struct JsonRpcWallet {
    http: reqwest::Client,
    rpc_url: Url,
    next_id: AtomicU64,
    state: Mutex<WalletState>,
}

impl JsonRpcWallet {
    pub fn new(wallet: &WalletConfig, api: &ApiConfig) -> Result<Self, DeckError> {
        let rpc_url = Url::parse(wallet.rpc_url.trim()).map_err(|e| {
            DeckError::Config(format!("Invalid wallet RPC URL '{}': {}", wallet.rpc_url, e))
        })?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .connect_timeout(Duration::from_secs(api.connect_timeout_secs))
            .build()
            .map_err(|e| DeckError::Config(format!("HTTP client build failed: {}", e)))?;

        Ok(JsonRpcWallet {
            http,
            rpc_url,
            next_id: AtomicU64::new(1),
            state: Mutex::new(WalletState::default()),
        })
    }

    pub fn rpc_url(&self) -> &Url {
        &self.rpc_url
    }

    /// Numeric chain id of the connected network.
    pub async fn chain_id(&self) -> Result<u64, DeckError> {
        let hex_id: String = self.call("eth_chainId").await?;
        let digits = hex_id.trim().trim_start_matches("0x");
        u64::from_str_radix(digits, 16)
            .map_err(|_| DeckError::Wallet(format!("Invalid chain id '{}'", hex_id)))
    }

    /// Re-read the account list without prompting. Fires the registered
    /// callbacks and returns `true` when the selected account changed.
    pub async fn poll_accounts(&self) -> Result<bool, DeckError> {
        let accounts: Vec<String> = self.call("eth_accounts").await?;
        let address = Self::first_address(&accounts)?;
        Ok(self.update_address(address))
    }

    async fn call<R: DeserializeOwned>(&self, method: &str) -> Result<R, DeckError> {
        let _tmr = timer!(Level::Trace; "JsonRpcWallet::call", "{}", method);

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": [],
        });

        let response: RpcResponse = self
            .http
            .post(self.rpc_url.clone())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(DeckError::Wallet(format!(
                "{} failed: {} (code {})",
                method, error.message, error.code
            )));
        }
        let result = response
            .result
            .ok_or_else(|| DeckError::Wallet(format!("{} returned no result", method)))?;
        Ok(serde_json::from_value(result)?)
    }

    fn first_address(accounts: &[String]) -> Result<Option<WalletAddress>, DeckError> {
        accounts.first().map(|a| a.parse()).transpose()
    }

    fn lock(&self) -> MutexGuard<'_, WalletState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update_address(&self, address: Option<WalletAddress>) -> bool {
        let listeners = {
            let mut state = self.lock();
            if state.address == address {
                return false;
            }
            state.address = address.clone();
            state.listeners.clone()
        };

        match &address {
            Some(a) => info!("Wallet account is now {}", a.short()),
            None => info!("Wallet disconnected"),
        }
        // Called without the lock so callbacks may query the wallet
        for listener in listeners {
            (*listener)(address.as_ref());
        }
        true
    }
}

#[async_trait]
impl WalletProvider for JsonRpcWallet {
    async fn connect(&self) -> Result<WalletAddress, DeckError> {
        let accounts: Vec<String> = self.call("eth_requestAccounts").await?;
        debug!("Wallet returned {} account(s)", accounts.len());
        let address = Self::first_address(&accounts)?
            .ok_or_else(|| DeckError::Wallet("Wallet returned no accounts".into()))?;
        self.update_address(Some(address.clone()));
        Ok(address)
    }

    fn address(&self) -> Option<WalletAddress> {
        self.lock().address.clone()
    }

    fn on_accounts_changed(&self, callback: AccountsCallback) {
        self.lock().listeners.push(Arc::new(callback));
    }
}
