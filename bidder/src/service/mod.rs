pub mod bidding;
pub mod clock;
pub mod live_auction;
