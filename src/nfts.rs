use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::utils::Utils;

/// Rarity grade of an NFT. Labels double as backend filter values.
#[derive(
    AsRefStr,
    EnumIter,
    EnumString,
    Display,
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
    Mythic,
    // Grades this client doesn't know about yet
    #[default]
    #[serde(other)]
    Unknown,
}

/// One NFT as returned by the collection and marketplace endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nft {
    #[serde(alias = "_id", deserialize_with = "Utils::string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "Utils::string_or_number")]
    pub token_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub rarity: Rarity,
    /// Membership tier the NFT belongs to, e.g. "gold"
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default, deserialize_with = "Utils::opt_decimal")]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub is_listed: bool,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Nft {
    /// Listing price when the NFT is actually on sale.
    pub fn sale_price(&self) -> Option<Decimal> {
        if self.is_listed {
            self.price
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rarity_labels() {
        assert_eq!(Rarity::Legendary.as_ref(), "legendary");
        assert_eq!("epic".parse::<Rarity>().unwrap(), Rarity::Epic);
        assert!("celestial".parse::<Rarity>().is_err());
    }

    #[test]
    fn test_unknown_rarity_does_not_break_decoding() {
        let nft: Nft = serde_json::from_str(
            r#"{"_id":"a1","tokenId":7,"name":"Orb","rarity":"celestial","price":"1.5","isListed":true}"#,
        )
        .unwrap();
        assert_eq!(nft.id, "a1");
        assert_eq!(nft.token_id, "7");
        assert_eq!(nft.rarity, Rarity::Unknown);
        assert_eq!(nft.sale_price(), Some("1.5".parse().unwrap()));
    }

    #[test]
    fn test_minimal_nft() {
        let nft: Nft = serde_json::from_str(r#"{"id":"n","tokenId":"0x01"}"#).unwrap();
        assert!(!nft.is_listed);
        assert_eq!(nft.price, None);
        assert_eq!(nft.sale_price(), None);
        assert_eq!(nft.created_at, None);
    }
}
