pub mod bid;
pub mod chat;
pub mod events;
