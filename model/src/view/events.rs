use serde::Deserialize;

/// One structured message from the per-auction push feed, discriminated by
/// its `type` field. Unknown types collapse into [`Other`](Self::Other) so
/// a new server-side message never kills the subscription.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum AuctionEvent {
    // The channel layer and the consumer spell this tag differently
    #[serde(rename = "bid_update", alias = "send_bid_update")]
    BidUpdate {
        #[serde(default)]
        user: Option<String>,
        #[serde(default)]
        ticket_id: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(rename = "auction_extended")]
    AuctionExtended { extended_by_seconds: i64 },
    #[serde(rename = "auction_closed", alias = "auction.closed")]
    AuctionClosed {
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(rename = "user_joined")]
    UserJoined {
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(rename = "user_left")]
    UserLeft {
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(other)]
    Other,
}
