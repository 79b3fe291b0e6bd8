//! Aggregates derived from the currently loaded page.
//!
//! These are page-scoped figures, not collection totals: a collection that
//! spans several pages reports only what the current page holds. Global
//! totals come from `Pagination::total_items`.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::nfts::{Nft, Rarity};
use crate::transactions::{Transaction, TransactionStatus};

/// Pure, total aggregation over a slice of items. An empty slice yields
/// the all-zero value.
///
/// Sums saturate at `Decimal::MAX` instead of overflowing.
pub trait Aggregate<T>: Clone + Debug + Default + PartialEq + Send + Sync + 'static {
    fn compute(items: &[T]) -> Self;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
    pub total: usize,
    pub on_sale: usize,
    pub not_listed: usize,
    /// Sum of listing prices of on-sale items
    pub listed_value: Decimal,
}

impl Aggregate<Nft> for CollectionStats {
    fn compute(items: &[Nft]) -> Self {
        items.iter().fold(Self::default(), |mut stats, nft| {
            stats.total += 1;
            if nft.is_listed {
                stats.on_sale += 1;
                stats.listed_value = stats
                    .listed_value
                    .saturating_add(nft.sale_price().unwrap_or(Decimal::ZERO));
            } else {
                stats.not_listed += 1;
            }
            stats
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketStats {
    pub count: usize,
    /// Lowest price on the page; zero when nothing is priced
    pub floor_price: Decimal,
    pub average_price: Decimal,
    pub count_by_rarity: BTreeMap<Rarity, usize>,
}

impl Aggregate<Nft> for MarketStats {
    fn compute(items: &[Nft]) -> Self {
        let mut stats = Self {
            count: items.len(),
            ..Default::default()
        };

        let mut priced = 0u32;
        let mut sum = Decimal::ZERO;
        let mut floor: Option<Decimal> = None;

        for nft in items {
            *stats.count_by_rarity.entry(nft.rarity).or_insert(0) += 1;
            if let Some(price) = nft.price {
                priced += 1;
                sum = sum.saturating_add(price);
                floor = Some(floor.map_or(price, |f| f.min(price)));
            }
        }

        stats.floor_price = floor.unwrap_or(Decimal::ZERO);
        if priced > 0 {
            stats.average_price = (sum / Decimal::from(priced)).round_dp(8).normalize();
        }
        stats
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStats {
    pub count: usize,
    pub completed: usize,
    pub pending: usize,
    pub failed: usize,
    /// Sum of completed amounts
    pub volume: Decimal,
}

impl Aggregate<Transaction> for TransactionStats {
    fn compute(items: &[Transaction]) -> Self {
        items.iter().fold(Self::default(), |mut stats, tx| {
            stats.count += 1;
            match tx.status {
                TransactionStatus::Completed => {
                    stats.completed += 1;
                    stats.volume = stats.volume.saturating_add(tx.amount_or_zero());
                }
                TransactionStatus::Pending => stats.pending += 1,
                TransactionStatus::Failed => stats.failed += 1,
                TransactionStatus::Unknown => {}
            }
            stats
        })
    }
}
