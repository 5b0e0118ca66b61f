use core::str::FromStr;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Encapsulate the backend's integer identifiers in custom structs to let
/// the compiler differentiate them
macro_rules! impl_id_encapsulation {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name {
            id: i64,
        }

        impl From<i64> for $name {
            #[inline(always)]
            fn from(id: i64) -> Self { $name { id } }
        }

        impl From<$name> for i64 {
            #[inline(always)]
            fn from(value: $name) -> i64 { value.id }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            #[inline(always)]
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<i64>().map(|id| id.into())
            }
        }

        impl fmt::Display for $name {
            #[inline(always)]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.id)
            }
        }
    };
}

impl_id_encapsulation!(AuctionId);
impl_id_encapsulation!(BidId);

pub mod domain;
pub mod dto;
pub mod view;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auction_id_round_trips_as_a_bare_number() {
        let id: AuctionId = serde_json::from_str("42").unwrap();
        assert_eq!(id, AuctionId::from(42));
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
    }

    #[test]
    fn ids_parse_from_strings() {
        assert_eq!("7".parse::<BidId>().unwrap(), BidId::from(7));
        assert!("not a number".parse::<BidId>().is_err());
    }
}
