pub mod channel;
pub mod countdown;
