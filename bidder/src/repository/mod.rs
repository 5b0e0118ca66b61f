pub mod auction_api;
pub mod channel;
