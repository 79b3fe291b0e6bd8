use clap::{Args, Parser, Subcommand};
use log::{debug, info};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::config::Config;
use crate::controller::{PagedQuery, QueryView, RequestStatus};
use crate::error::{DeckError, FALLBACK_BACKEND_MESSAGE};
use crate::filters::{CollectionFilters, MarketFilters, TransactionFilters};
use crate::nfts::Nft;
use crate::query::{FilterValue, Filters, QueryState, LIMIT_KEY, SORT_BY_KEY, SORT_ORDER_KEY};
use crate::service::{ApiClient, PageFetcher};
use crate::stats::{Aggregate, CollectionStats, MarketStats, TransactionStats};
use crate::transactions::Transaction;
use crate::utils::Utils;
use crate::wallet::{JsonRpcWallet, WalletProvider};

#[derive(Parser)]
#[command(
    name = "nftdeck",
    version,
    about = "nftdeck: browse your NFT collection, the marketplace and your transaction history"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Paging and output options shared by the listing commands.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct PageArgs {
    /// Page to show, starting at 1
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Items per page (default: `query.default_limit` from the config)
    #[arg(long)]
    pub limit: Option<u32>,

    /// Sort field, optionally with a direction: `price` or `price:asc`
    #[arg(long)]
    pub sort: Option<String>,

    /// Print the whole view (items, stats, pagination) as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the NFTs you own
    Collection {
        /// Listing status: all, sale or not-listed
        #[arg(long, default_value = "all")]
        status: String,

        /// Free-text search
        #[arg(long)]
        search: Option<String>,

        #[command(flatten)]
        paging: PageArgs,
    },

    /// Browse marketplace listings
    Market {
        /// Rarity: all, common, rare, epic, legendary or mythic
        #[arg(long, default_value = "all")]
        rarity: String,

        #[arg(long = "min-price")]
        min_price: Option<Decimal>,

        #[arg(long = "max-price")]
        max_price: Option<Decimal>,

        /// Free-text search
        #[arg(long)]
        search: Option<String>,

        #[command(flatten)]
        paging: PageArgs,
    },

    /// Show your transaction history
    Transactions {
        /// Transaction type: all, purchase, sale, mint, transfer, mystery-box or investment
        #[arg(long = "type", default_value = "all")]
        kind: String,

        /// Status: all, pending, completed or failed
        #[arg(long, default_value = "all")]
        status: String,

        #[command(flatten)]
        paging: PageArgs,
    },

    /// Connect to the configured wallet and show the selected account
    Wallet,

    /// Print the effective configuration
    Config,
}

/// One output line per item.
trait TableRow {
    fn row(&self) -> String;
}

impl TableRow for Nft {
    fn row(&self) -> String {
        let price = self
            .price
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_owned());
        let listed = if self.is_listed { "for sale" } else { "" };
        format!(
            "{:<10} {:<28} {:<10} {:>14} {}",
            Utils::abbreviate(&self.token_id, 4),
            self.name,
            self.rarity,
            price,
            listed
        )
    }
}

impl TableRow for Transaction {
    fn row(&self) -> String {
        let when = self
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        format!(
            "{:<16} {:<12} {:<10} {:>14} {:<6} {}",
            when,
            self.kind,
            self.status,
            self.amount_or_zero(),
            self.currency.as_deref().unwrap_or(""),
            self.tx_hash
                .as_deref()
                .map(|h| Utils::abbreviate(h, 6))
                .unwrap_or_default()
        )
    }
}

trait Summary {
    fn summary(&self) -> String;
}

impl Summary for CollectionStats {
    fn summary(&self) -> String {
        format!(
            "On this page: {} NFTs, {} for sale ({} listed value), {} not listed",
            self.total, self.on_sale, self.listed_value, self.not_listed
        )
    }
}

impl Summary for MarketStats {
    fn summary(&self) -> String {
        let by_rarity: Vec<String> = self
            .count_by_rarity
            .iter()
            .map(|(rarity, count)| format!("{} {}", count, rarity))
            .collect();
        format!(
            "On this page: {} listings, floor {}, average {} [{}]",
            self.count,
            self.floor_price,
            self.average_price,
            by_rarity.join(", ")
        )
    }
}

impl Summary for TransactionStats {
    fn summary(&self) -> String {
        format!(
            "On this page: {} transactions, {} completed, {} pending, {} failed, volume {}",
            self.count, self.completed, self.pending, self.failed, self.volume
        )
    }
}

impl Cli {
    pub fn handle_command_line(config: &Config) -> Result<(), DeckError> {
        let args = Cli::parse();

        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| DeckError::Error(format!("Failed to create runtime: {}", e)))?;

        rt.block_on(Self::run(args.command, config))
    }

    async fn run(command: Command, config: &Config) -> Result<(), DeckError> {
        match command {
            Command::Collection {
                status,
                search,
                paging,
            } => {
                let mut fields = vec![("status", FilterValue::Choice(status))];
                if let Some(text) = search {
                    fields.push(("search", FilterValue::Search(text)));
                }
                let state = Self::initial_state::<CollectionFilters>(config, &paging, fields)?;
                Self::show_listing::<_, Nft, CollectionStats>(
                    config,
                    &config.api.collection_path,
                    state,
                    &paging,
                )
                .await
            }
            Command::Market {
                rarity,
                min_price,
                max_price,
                search,
                paging,
            } => {
                let mut fields = vec![("rarity", FilterValue::Choice(rarity))];
                if min_price.is_some() || max_price.is_some() {
                    fields.push(("price", FilterValue::range(min_price, max_price)));
                }
                if let Some(text) = search {
                    fields.push(("search", FilterValue::Search(text)));
                }
                let state = Self::initial_state::<MarketFilters>(config, &paging, fields)?;
                Self::show_listing::<_, Nft, MarketStats>(
                    config,
                    &config.api.market_path,
                    state,
                    &paging,
                )
                .await
            }
            Command::Transactions {
                kind,
                status,
                paging,
            } => {
                let fields = vec![
                    ("type", FilterValue::Choice(kind)),
                    ("status", FilterValue::Choice(status)),
                ];
                let state = Self::initial_state::<TransactionFilters>(config, &paging, fields)?;
                Self::show_listing::<_, Transaction, TransactionStats>(
                    config,
                    &config.api.transactions_path,
                    state,
                    &paging,
                )
                .await
            }
            Command::Wallet => Self::connect_wallet(config).await,
            Command::Config => Self::print_config(config),
        }
    }

    /// Build the starting query through the same setters the controller
    /// uses, so flags are validated exactly like interactive changes.
    fn initial_state<F: Filters>(
        config: &Config,
        paging: &PageArgs,
        fields: Vec<(&str, FilterValue)>,
    ) -> Result<QueryState<F>, DeckError> {
        // The upper bound is checked by `set_page` once the first page is in
        if paging.page < 1 {
            return Err(DeckError::PageOutOfRange {
                requested: paging.page,
                total_pages: 1,
            });
        }
        let mut state = QueryState::new(config.query.default_limit);
        if let Some(limit) = paging.limit {
            state.set(LIMIT_KEY, FilterValue::Number(limit))?;
        }
        for (key, value) in fields {
            state.set(key, value)?;
        }
        if let Some(sort) = &paging.sort {
            let (field, order) = match sort.split_once(':') {
                Some((field, order)) => (field, Some(order)),
                None => (sort.as_str(), None),
            };
            state.set(SORT_BY_KEY, FilterValue::Search(field.trim().to_owned()))?;
            if let Some(order) = order {
                state.set(SORT_ORDER_KEY, FilterValue::choice(order))?;
            }
        }
        Ok(state)
    }

    async fn show_listing<F, T, A>(
        config: &Config,
        path: &str,
        state: QueryState<F>,
        paging: &PageArgs,
    ) -> Result<(), DeckError>
    where
        F: Filters + Serialize,
        T: DeserializeOwned + Serialize + TableRow + Clone + Send + Sync + 'static,
        A: Aggregate<T> + Serialize + Summary,
    {
        let client = ApiClient::from_config(&config.api, &config.query)?;
        info!("Fetching {} from {}", path, client.base_url());
        let fetcher: Arc<dyn PageFetcher<T>> = Arc::new(client.endpoint::<T>(path));

        let query = PagedQuery::<F, T, A>::mount(fetcher, state).await;
        if paging.page > 1 && query.status() == RequestStatus::Success {
            query.set_page(paging.page).await?;
        }

        let view = query.snapshot();
        if view.status == RequestStatus::Error {
            return Err(DeckError::Error(
                view.error
                    .unwrap_or_else(|| FALLBACK_BACKEND_MESSAGE.to_owned()),
            ));
        }

        if paging.json {
            println!("{}", serde_json::to_string_pretty(&view)?);
        } else {
            Self::print_view(&view);
        }
        Ok(())
    }

    fn print_view<F, T: TableRow, A: Summary>(view: &QueryView<F, T, A>) {
        if view.items.is_empty() {
            println!("Nothing found.");
        }
        for item in &view.items {
            println!("{}", item.row());
        }
        if let Some(pagination) = view.pagination {
            println!();
            println!(
                "Page {} of {} ({} total)",
                pagination.page,
                pagination.last_page(),
                pagination.total_items
            );
        }
        println!("{}", view.stats.summary());
    }

    async fn connect_wallet(config: &Config) -> Result<(), DeckError> {
        let wallet = JsonRpcWallet::new(&config.wallet, &config.api)?;
        debug!("Connecting to wallet at {}", wallet.rpc_url());
        let address = wallet.connect().await?;
        let chain_id = wallet.chain_id().await?;
        println!("Connected: {} (chain {})", address, chain_id);
        Ok(())
    }

    fn print_config(config: &Config) -> Result<(), DeckError> {
        let mut shown = config.clone();
        if shown.api.token.is_some() {
            shown.api.token = Some("********".to_owned());
        }
        let text = toml::to_string_pretty(&shown)
            .map_err(|e| DeckError::Config(format!("Failed to serialize config: {}", e)))?;
        print!("{}", text);
        Ok(())
    }
}
