pub mod cli;
pub mod config;
pub mod controller;
pub mod envelope;
pub mod error;
pub mod filters;
pub mod logging;
pub mod nfts;
pub mod pagination;
pub mod query;
pub mod service;
pub mod stats;
pub mod transactions;
pub mod utils;
pub mod wallet;

pub use controller::{PagedQuery, QueryView, RequestStatus};
pub use error::DeckError;
pub use pagination::{Pagination, ResultPage};
pub use query::{FilterValue, QueryState};
