use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{AuctionId, BidId};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error(
        "the current price {current} is below the starting price {starting}"
    )]
    PriceBelowStart { current: Decimal, starting: Decimal },
    #[error("the bid increment must be strictly positive, got {0}")]
    NonPositiveIncrement(Decimal),
}

/// The server-authoritative auction state, as returned by
/// `GET /auctions/{id}/`. Replaced wholesale on every refresh; never
/// patched in place.
#[derive(Debug, Clone, Deserialize)]
pub struct AuctionSnapshot {
    pub id:        AuctionId,
    pub item_name: String,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(with = "rust_decimal::serde::str")]
    pub starting_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub current_price: Decimal,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub reserve_price: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::str")]
    pub bid_increment: Decimal,
    pub status: AuctionStatus,
    #[serde(default)]
    pub snipe_protection: Option<SnipeProtection>,
    #[serde(default)]
    pub bids: Vec<BidRecord>,
}

impl AuctionSnapshot {
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.current_price < self.starting_price {
            return Err(SnapshotError::PriceBelowStart {
                current:  self.current_price,
                starting: self.starting_price,
            });
        }
        if self.bid_increment <= Decimal::ZERO {
            return Err(SnapshotError::NonPositiveIncrement(
                self.bid_increment,
            ));
        }
        Ok(())
    }

    /// The smallest amount the server should accept next.
    pub fn minimum_bid(&self) -> Decimal {
        self.current_price + self.bid_increment
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionStatus {
    Upcoming,
    Active,
    // The server spells closure both ways depending on the code path
    #[serde(alias = "closed")]
    Ended,
}

/// The anti-sniping policy in force for one auction.
#[derive(Debug, Clone, Deserialize)]
pub struct SnipeProtection {
    pub enabled: bool,
    pub threshold_seconds: i64,
    pub extension_duration_seconds: i64,
    #[serde(default)]
    pub times_extended: u32,
}

/// One recorded bid. The collection is append-only from the client's
/// perspective and replaced wholesale after every refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct BidRecord {
    pub id:        BidId,
    pub user_name: String,
    pub ticket_id: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Display ordering: highest amount first, ties broken by whoever bid it
/// earliest. The first record after sorting is the highest bid.
pub fn sort_for_display(bids: &mut [BidRecord]) {
    bids.sort_by(|a, b| match b.amount.cmp(&a.amount) {
        Ordering::Equal => a.created_at.cmp(&b.created_at),
        ordering => ordering,
    });
}

fn lenient_datetime<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    // A missing or garbled timestamp is a degraded auction, not a fatal
    // deserialization failure
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|text| text.parse::<DateTime<Utc>>().ok()))
}
