use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lazy_regex::regex_is_match;
use model::view::bid::{BidOutcome, PlaceBidRequest};
use model::AuctionId;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::repository::auction_api::{self, AuctionApi};

/// How long a submission may stay in flight before it is surfaced as a
/// transport failure instead of wedging the controller.
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "{0:?} is not a valid amount, expected a non-negative number with \
         at most two decimals"
    )]
    AmountFormat(String),
}

#[derive(Debug, Default)]
struct Pending {
    amount: Option<Decimal>,
    /// Latest known `(current_price, bid_increment)` pair.
    floor:  Option<(Decimal, Decimal)>,
    frozen: bool,
}

/// Owns the user's in-progress bid amount, enforces the minimum-increment
/// rule against the latest known price, and submits. The minimum check is
/// advisory: the server stays authoritative and may still reject.
#[derive(Debug)]
pub struct BidController {
    api: Arc<dyn AuctionApi>,
    auction_id: AuctionId,
    pending: Mutex<Pending>,
    in_flight: AtomicBool,
}

impl BidController {
    pub fn new(api: Arc<dyn AuctionApi>, auction_id: AuctionId) -> Self {
        Self {
            api,
            auction_id,
            pending: Mutex::new(Pending::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Validate the raw form input and store it as the pending amount.
    pub fn propose_amount(&self, raw: &str) -> Result<Decimal, Error> {
        let raw = raw.trim();
        if !regex_is_match!(r"^\d+(\.\d{0,2})?$", raw) {
            return Err(Error::AmountFormat(raw.to_string()));
        }
        let amount = raw
            .trim_end_matches('.')
            .parse::<Decimal>()
            .map_err(|_| Error::AmountFormat(raw.to_string()))?;
        self.pending.lock().unwrap().amount = Some(amount);
        Ok(amount)
    }

    /// Bump the pending amount by a quick-add delta (the +increment and
    /// +25/+50/... buttons of the bid form).
    pub fn nudge(&self, delta: Decimal) -> Decimal {
        let mut pending = self.pending.lock().unwrap();
        let bumped = pending.amount.unwrap_or(Decimal::ZERO) + delta;
        pending.amount = Some(bumped);
        bumped
    }

    /// Record the latest server-known floor. When nothing was proposed yet
    /// the pending amount is primed to the likely next bid.
    pub fn observe_floor(&self, current_price: Decimal, increment: Decimal) {
        let mut pending = self.pending.lock().unwrap();
        pending.floor = Some((current_price, increment));
        if pending.amount.is_none() {
            pending.amount = Some(current_price + increment);
        }
    }

    pub fn pending_amount(&self) -> Option<Decimal> {
        self.pending.lock().unwrap().amount
    }

    /// No further submission is accepted once the auction is over.
    pub fn freeze(&self) {
        self.pending.lock().unwrap().frozen = true;
    }

    /// Submit the pending amount. All local refusals happen before any
    /// network traffic; a second call while one is in flight is a no-op
    /// answered with [`BidOutcome::AlreadySubmitting`].
    pub async fn submit(&self) -> BidOutcome {
        let (amount, increment) = {
            let pending = self.pending.lock().unwrap();
            if pending.frozen {
                return BidOutcome::Rejected {
                    reason: "This auction is no longer active".to_string(),
                };
            }
            let Some(amount) = pending.amount else {
                return BidOutcome::Rejected {
                    reason: "No bid amount proposed".to_string(),
                };
            };
            let Some((current_price, increment)) = pending.floor else {
                return BidOutcome::Rejected {
                    reason: "The auction state is not known yet"
                        .to_string(),
                };
            };
            let minimum = current_price + increment;
            if amount < minimum {
                return BidOutcome::Rejected {
                    reason: format!("Minimum bid is {minimum}"),
                };
            }
            (amount, increment)
        };

        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("A submission is already in flight, refusing another");
            return BidOutcome::AlreadySubmitting;
        }

        let request = PlaceBidRequest {
            auction_id: self.auction_id,
            bid_amount: amount,
        };
        let reply =
            tokio::time::timeout(SUBMIT_TIMEOUT, self.api.place_bid(&request))
                .await;
        self.in_flight.store(false, Ordering::SeqCst);

        let reply = match reply {
            Ok(reply) => reply,
            Err(_) => {
                warn!("The bid submission timed out");
                return BidOutcome::TransportError {
                    reason: "The bid submission timed out".to_string(),
                };
            }
        };

        match reply {
            Ok(accepted) => {
                // The server does not always echo the new price back
                let new_price = accepted.current_price.unwrap_or(amount);
                {
                    let mut pending = self.pending.lock().unwrap();
                    pending.floor = Some((new_price, increment));
                    // Prime the next likely bid
                    pending.amount = Some(new_price + increment);
                }
                if accepted.auction_extended {
                    let extended_by_seconds = accepted
                        .extension_info
                        .map(|info| info.extended_by_seconds)
                        .unwrap_or_default();
                    BidOutcome::AcceptedWithExtension {
                        new_price,
                        extended_by_seconds,
                    }
                } else {
                    BidOutcome::Accepted { new_price }
                }
            }
            Err(auction_api::Error::Rejected { message }) => {
                BidOutcome::Rejected { reason: message }
            }
            Err(transport) => BidOutcome::TransportError {
                reason: transport.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use model::dto::auction::{AuctionSnapshot, BidRecord};
    use model::view::bid::{ExtensionInfo, PlaceBidReply};
    use rust_decimal_macros::dec;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Recording fake: counts calls, optionally blocks until released,
    /// and answers with a canned reply.
    #[derive(Debug)]
    struct FakeApi {
        calls:   AtomicUsize,
        gate:    Option<Arc<Notify>>,
        replies: Mutex<Vec<Result<PlaceBidReply, auction_api::Error>>>,
    }

    impl FakeApi {
        fn accepting(new_price: Decimal) -> Self {
            Self {
                calls:   AtomicUsize::new(0),
                gate:    None,
                replies: Mutex::new(vec![Ok(PlaceBidReply {
                    auction_extended: false,
                    extension_info:   None,
                    current_price:    Some(new_price),
                })]),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuctionApi for FakeApi {
        async fn fetch_auction(
            &self,
            _id: AuctionId,
        ) -> Result<AuctionSnapshot, auction_api::Error> {
            unimplemented!("not used by the bid controller")
        }

        async fn fetch_bids(
            &self,
            _id: AuctionId,
        ) -> Result<Vec<BidRecord>, auction_api::Error> {
            unimplemented!("not used by the bid controller")
        }

        async fn place_bid(
            &self,
            _request: &PlaceBidRequest,
        ) -> Result<PlaceBidReply, auction_api::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.replies.lock().unwrap().pop().unwrap()
        }

        async fn fetch_chat_history(
            &self,
            _id: AuctionId,
        ) -> Result<Vec<model::view::chat::ChatMessage>, auction_api::Error>
        {
            unimplemented!("not used by the bid controller")
        }
    }

    fn controller(api: Arc<FakeApi>) -> BidController {
        let controller =
            BidController::new(api, AuctionId::from(12));
        controller.observe_floor(dec!(100.00), dec!(5.00));
        controller
    }

    #[test]
    fn the_pending_amount_is_primed_from_the_floor() {
        let api = Arc::new(FakeApi::accepting(dec!(0)));
        let controller = controller(api);
        assert_eq!(controller.pending_amount(), Some(dec!(105.00)));
    }

    #[test]
    fn propose_amount_rejects_garbage() {
        let api = Arc::new(FakeApi::accepting(dec!(0)));
        let controller = controller(api);
        assert!(controller.propose_amount("ten dollars").is_err());
        assert!(controller.propose_amount("-5.00").is_err());
        assert!(controller.propose_amount("1.234").is_err());
        assert!(controller.propose_amount("110.5").is_ok());
        assert!(controller.propose_amount("110.").is_ok());
    }

    #[tokio::test]
    async fn a_bid_below_the_minimum_is_rejected_without_network() {
        let api = Arc::new(FakeApi::accepting(dec!(0)));
        let controller = controller(api.clone());
        controller.propose_amount("104.00").unwrap();

        let outcome = controller.submit().await;
        assert_eq!(
            outcome,
            BidOutcome::Rejected {
                reason: "Minimum bid is 105.00".to_string()
            }
        );
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn an_accepted_bid_primes_the_next_one() {
        let api = Arc::new(FakeApi::accepting(dec!(110.00)));
        let controller = controller(api.clone());
        controller.propose_amount("110.00").unwrap();

        let outcome = controller.submit().await;
        assert_eq!(
            outcome,
            BidOutcome::Accepted { new_price: dec!(110.00) }
        );
        assert_eq!(controller.pending_amount(), Some(dec!(115.00)));
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn an_extension_reply_is_a_distinguished_success() {
        let api = Arc::new(FakeApi {
            calls:   AtomicUsize::new(0),
            gate:    None,
            replies: Mutex::new(vec![Ok(PlaceBidReply {
                auction_extended: true,
                extension_info:   Some(ExtensionInfo {
                    extended_by_seconds: 120,
                }),
                current_price:    Some(dec!(110.00)),
            })]),
        });
        let controller = controller(api);
        controller.propose_amount("110.00").unwrap();

        assert_eq!(
            controller.submit().await,
            BidOutcome::AcceptedWithExtension {
                new_price:           dec!(110.00),
                extended_by_seconds: 120,
            }
        );
    }

    #[tokio::test]
    async fn a_second_submit_while_in_flight_is_refused() {
        let gate = Arc::new(Notify::new());
        let api = Arc::new(FakeApi {
            calls:   AtomicUsize::new(0),
            gate:    Some(gate.clone()),
            replies: Mutex::new(vec![Ok(PlaceBidReply {
                auction_extended: false,
                extension_info:   None,
                current_price:    Some(dec!(110.00)),
            })]),
        });
        let controller = Arc::new(controller(api.clone()));
        controller.propose_amount("110.00").unwrap();

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.submit().await })
        };
        // Let the first submission reach the (gated) network call
        tokio::task::yield_now().await;
        while api.calls() == 0 {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            controller.submit().await,
            BidOutcome::AlreadySubmitting
        );
        assert_eq!(api.calls(), 1);

        gate.notify_one();
        assert_eq!(
            first.await.unwrap(),
            BidOutcome::Accepted { new_price: dec!(110.00) }
        );
    }

    #[tokio::test]
    async fn a_server_rejection_is_surfaced_verbatim() {
        let api = Arc::new(FakeApi {
            calls:   AtomicUsize::new(0),
            gate:    None,
            replies: Mutex::new(vec![Err(
                auction_api::Error::Rejected {
                    message: "Auction has already ended".to_string(),
                },
            )]),
        });
        let controller = controller(api);
        controller.propose_amount("110.00").unwrap();

        assert_eq!(
            controller.submit().await,
            BidOutcome::Rejected {
                reason: "Auction has already ended".to_string()
            }
        );
    }

    #[tokio::test]
    async fn a_frozen_controller_refuses_locally() {
        let api = Arc::new(FakeApi::accepting(dec!(110.00)));
        let controller = controller(api.clone());
        controller.propose_amount("110.00").unwrap();
        controller.freeze();

        assert!(matches!(
            controller.submit().await,
            BidOutcome::Rejected { .. }
        ));
        assert_eq!(api.calls(), 0);
    }

    #[test]
    fn nudge_accumulates_on_the_pending_amount() {
        let api = Arc::new(FakeApi::accepting(dec!(0)));
        let controller = controller(api);
        assert_eq!(controller.nudge(dec!(25.00)), dec!(130.00));
        assert_eq!(controller.nudge(dec!(5.00)), dec!(135.00));
    }
}
