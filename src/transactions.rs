use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::utils::Utils;

#[derive(
    AsRefStr, EnumIter, EnumString, Display, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TransactionKind {
    Purchase,
    Sale,
    Mint,
    Transfer,
    MysteryBox,
    Investment,
    #[serde(other)]
    Unknown,
}

#[derive(
    AsRefStr, EnumIter, EnumString, Display, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

/// One entry of the user's transaction history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(alias = "_id", deserialize_with = "Utils::string_or_number")]
    pub id: String,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(rename = "type", alias = "kind")]
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    #[serde(default, deserialize_with = "Utils::opt_decimal")]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub nft_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn amount_or_zero(&self) -> Decimal {
        self.amount.unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_kind_labels() {
        assert_eq!(TransactionKind::MysteryBox.as_ref(), "mystery-box");
        assert_eq!(
            "mystery-box".parse::<TransactionKind>().unwrap(),
            TransactionKind::MysteryBox
        );
        assert!("airdrop".parse::<TransactionKind>().is_err());
        assert_eq!(TransactionKind::iter().count(), 7);
    }

    #[test]
    fn test_decode_transaction() {
        let tx: Transaction = serde_json::from_str(
            r#"{"_id":"t1","txHash":"0xabc","type":"purchase","status":"completed","amount":"250.00","createdAt":"2026-03-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(tx.kind, TransactionKind::Purchase);
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.amount_or_zero(), "250".parse::<Decimal>().unwrap());
        assert!(tx.created_at.is_some());
    }

    #[test]
    fn test_decode_unknown_status() {
        let tx: Transaction =
            serde_json::from_str(r#"{"id":3,"type":"airdrop","status":"reverted"}"#).unwrap();
        assert_eq!(tx.kind, TransactionKind::Unknown);
        assert_eq!(tx.status, TransactionStatus::Unknown);
        assert_eq!(tx.amount_or_zero(), Decimal::ZERO);
    }
}
