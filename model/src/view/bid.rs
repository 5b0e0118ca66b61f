use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::AuctionId;

/// Body of `POST /bid/place/`. The amount travels as a 2-decimal string,
/// the way the backend serializes all money.
#[derive(Debug, Clone, Serialize)]
pub struct PlaceBidRequest {
    pub auction_id: AuctionId,
    #[serde(with = "rust_decimal::serde::str")]
    pub bid_amount: Decimal,
}

/// Success body of `POST /bid/place/`. `auction_extended` distinguishes
/// the bid that tripped the anti-sniping policy.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceBidReply {
    #[serde(default)]
    pub auction_extended: bool,
    #[serde(default)]
    pub extension_info: Option<ExtensionInfo>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub current_price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionInfo {
    pub extended_by_seconds: i64,
}

/// Error body the backend attaches to a non-2xx bid response. Different
/// handlers fill in different fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ApiErrorBody {
    pub fn message(&self) -> Option<&str> {
        self.error.as_deref().or(self.detail.as_deref())
    }
}

/// Outcome of one bid submission. Expected business conditions are
/// variants here, never errors: only programmer mistakes may panic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BidOutcome {
    Accepted {
        new_price: Decimal,
    },
    AcceptedWithExtension {
        new_price:           Decimal,
        extended_by_seconds: i64,
    },
    /// The server (or the local minimum check) refused the bid; the reason
    /// is a user-facing message, surfaced verbatim.
    Rejected {
        reason: String,
    },
    /// Network or server failure, distinguishable from a business
    /// rejection so the caller can offer a manual retry.
    TransportError {
        reason: String,
    },
    /// A previous submission for this auction is still in flight.
    AlreadySubmitting,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn request_serializes_the_amount_as_a_string() {
        let request = PlaceBidRequest {
            auction_id: AuctionId::from(12),
            bid_amount: dec!(110.00),
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"auction_id":12,"bid_amount":"110.00"}"#
        );
    }

    #[test]
    fn a_plain_success_reply_defaults_to_no_extension() {
        let reply: PlaceBidReply =
            serde_json::from_str(r#"{"current_price": "110.00"}"#).unwrap();
        assert!(!reply.auction_extended);
        assert!(reply.extension_info.is_none());
        assert_eq!(reply.current_price, Some(dec!(110.00)));
    }

    #[test]
    fn an_extension_reply_carries_the_added_seconds() {
        let raw = r#"{
            "auction_extended": true,
            "extension_info": {"extended_by_seconds": 120}
        }"#;
        let reply: PlaceBidReply = serde_json::from_str(raw).unwrap();
        assert!(reply.auction_extended);
        assert_eq!(
            reply.extension_info.unwrap().extended_by_seconds,
            120
        );
    }

    #[test]
    fn the_error_body_prefers_error_over_detail() {
        let both: ApiErrorBody = serde_json::from_str(
            r#"{"error": "Auction is not active", "detail": "other"}"#,
        )
        .unwrap();
        assert_eq!(both.message(), Some("Auction is not active"));

        let detail_only: ApiErrorBody =
            serde_json::from_str(r#"{"detail": "Not found."}"#).unwrap();
        assert_eq!(detail_only.message(), Some("Not found."));

        assert_eq!(ApiErrorBody::default().message(), None);
    }
}
