use std::fmt::Debug;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use model::domain::channel::ChannelStatus;
use model::domain::countdown::CountdownState;
use model::dto::auction::{
    sort_for_display, AuctionSnapshot, AuctionStatus, BidRecord,
};
use model::view::bid::BidOutcome;
use model::view::chat::{ChatMessage, OutboundChat};
use model::view::events::AuctionEvent;
use model::AuctionId;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::repository::auction_api::{self, AuctionApi};
use crate::repository::channel::{self, LiveChannel};
use crate::service::bidding::BidController;
use crate::service::clock::{AuctionClock, ClockCue};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to load the auction: {0}")]
    Load(#[from] auction_api::Error),
    #[error("The server returned an inconsistent auction: {0}")]
    BadSnapshot(#[from] model::dto::auction::SnapshotError),
    #[error(transparent)]
    Channel(#[from] channel::Error),
}

/// A one-shot sound cue raised at a precise state transition. The core
/// only emits these; rendering (or ignoring) them is the caller's call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// 3, 2, 1...
    Countdown(u8),
    /// The hammer falls, the auction is over.
    Hammer,
    /// A snipe extension moved the end time.
    Extension,
}

pub trait CueSink: Debug + Send + Sync {
    fn play(&self, cue: Cue);
}

/// Read-only state snapshot handed to the presentation layer.
#[derive(Debug, Clone)]
pub struct LiveAuctionState {
    pub item_name:     String,
    pub current_price: Decimal,
    pub minimum_bid:   Decimal,
    pub pending_amount: Option<Decimal>,
    pub countdown:     CountdownState,
    pub frozen:        bool,
    pub bids:          Vec<BidRecord>,
    pub chat:          Vec<ChatMessage>,
    pub auction_feed:  ChannelStatus,
    pub chat_feed:     ChannelStatus,
    pub notice:        Option<String>,
}

/// Composition root of the live bidding view: wires the clock, the two
/// push feeds and the bid controller together and reconciles whatever
/// arrives first — a tick, a push event or a submission reply — into one
/// coherent state.
pub struct LiveAuction {
    api: Arc<dyn AuctionApi>,
    auction_id: AuctionId,
    clock: AuctionClock,
    bidding: BidController,
    auction_feed: LiveChannel<AuctionEvent>,
    chat_feed: LiveChannel<ChatMessage>,
    cues: Arc<dyn CueSink>,
    snapshot: Option<AuctionSnapshot>,
    bids: Vec<BidRecord>,
    chat: Vec<ChatMessage>,
    countdown: CountdownState,
    sounds_enabled: bool,
    frozen: bool,
    notice: Option<String>,
}

impl LiveAuction {
    pub fn new(
        api: Arc<dyn AuctionApi>,
        auction_id: AuctionId,
        auction_feed: LiveChannel<AuctionEvent>,
        chat_feed: LiveChannel<ChatMessage>,
        cues: Arc<dyn CueSink>,
    ) -> Self {
        Self {
            api: api.clone(),
            auction_id,
            clock: AuctionClock::new(None, None),
            bidding: BidController::new(api, auction_id),
            auction_feed,
            chat_feed,
            cues,
            snapshot: None,
            bids: Vec::new(),
            chat: Vec::new(),
            countdown: CountdownState::zeroed(
                model::domain::countdown::Phase::Upcoming,
            ),
            sounds_enabled: true,
            frozen: false,
            notice: None,
        }
    }

    /// Initial fetch + channel subscriptions. The channels' receiving
    /// ends must be taken (see [`Self::take_auction_events`]) and pumped
    /// into [`Self::handle_event`] / [`Self::push_chat`] by the driver.
    pub async fn open(&mut self) -> Result<(), Error> {
        self.load().await?;
        self.auction_feed.connect().await?;
        if let Err(err) = self.chat_feed.connect().await {
            // Chat staying down degrades the view, it does not kill it
            warn!("The chat feed did not come up: {}", err);
        }
        Ok(())
    }

    /// Fetch and install the initial snapshot and chat transcript without
    /// touching the network channels.
    pub async fn load(&mut self) -> Result<(), Error> {
        let snapshot = self.api.fetch_auction(self.auction_id).await?;
        snapshot.validate()?;
        info!("Loaded auction {}: {}", snapshot.id, snapshot.item_name);
        self.install_snapshot(snapshot);
        // Messages from before we joined; starting empty is a degraded
        // view, not a failure
        match self.api.fetch_chat_history(self.auction_id).await {
            Ok(history) => self.chat = history,
            Err(err) => {
                warn!("Could not fetch the chat history: {}", err);
            }
        }
        Ok(())
    }

    pub fn take_auction_events(
        &mut self,
    ) -> Option<mpsc::UnboundedReceiver<AuctionEvent>> {
        self.auction_feed.events()
    }

    pub fn take_chat_messages(
        &mut self,
    ) -> Option<mpsc::UnboundedReceiver<ChatMessage>> {
        self.chat_feed.events()
    }

    /// One step of the 1-second cadence. Ticking is independent of the
    /// push feeds; whichever notices the end first wins and the other
    /// becomes a no-op.
    pub fn handle_tick(&mut self, now: DateTime<Utc>) {
        let step = self.clock.tick(now);
        self.countdown = step.countdown;
        for cue in step.cues {
            match cue {
                ClockCue::Threshold(n) if !self.frozen => {
                    self.play(Cue::Countdown(n));
                }
                ClockCue::Threshold(_) => {}
                ClockCue::Ended => {
                    self.close_out("Auction ended".to_string());
                }
            }
        }
    }

    /// One inbound message from the auction push feed.
    pub async fn handle_event(&mut self, event: AuctionEvent) {
        match event {
            AuctionEvent::BidUpdate { message, .. } => {
                debug!("A bid update came in, refreshing the bid list");
                if let Some(message) = message {
                    self.notice = Some(message);
                }
                self.refresh_bids().await;
            }
            AuctionEvent::AuctionExtended { extended_by_seconds } => {
                if self.frozen {
                    debug!("Ignoring an extension after closure");
                    return;
                }
                self.play(Cue::Extension);
                self.notice = Some(format!(
                    "Auction extended! {extended_by_seconds} seconds \
                     added due to a last-minute bid"
                ));
                self.refresh_snapshot().await;
            }
            AuctionEvent::AuctionClosed { message } => {
                self.close_out(message.unwrap_or_else(|| {
                    "This auction is now closed".to_string()
                }));
            }
            AuctionEvent::UserJoined { message }
            | AuctionEvent::UserLeft { message } => {
                if let Some(message) = message {
                    self.notice = Some(message);
                }
            }
            AuctionEvent::Other => {}
        }
    }

    /// Validate, submit and reconcile one user bid. Any rejection or
    /// transport failure leaves the displayed auction state untouched.
    pub async fn place_bid(&mut self, raw: &str) -> BidOutcome {
        if self.frozen {
            return BidOutcome::Rejected {
                reason: "This auction is no longer active".to_string(),
            };
        }
        if let Err(err) = self.bidding.propose_amount(raw) {
            return BidOutcome::Rejected { reason: err.to_string() };
        }
        let outcome = self.bidding.submit().await;
        match &outcome {
            BidOutcome::Accepted { .. } => {
                self.notice =
                    Some("Bid placed successfully!".to_string());
                self.refresh_snapshot().await;
                self.refresh_bids().await;
            }
            BidOutcome::AcceptedWithExtension {
                extended_by_seconds,
                ..
            } => {
                // Idempotent with the push-delivered extension event for
                // the same extension
                self.play(Cue::Extension);
                self.notice = Some(format!(
                    "Your bid placed! Auction extended by \
                     {extended_by_seconds} seconds"
                ));
                self.refresh_snapshot().await;
                self.refresh_bids().await;
            }
            BidOutcome::Rejected { .. }
            | BidOutcome::TransportError { .. }
            | BidOutcome::AlreadySubmitting => {}
        }
        outcome
    }

    /// Bump the pending amount (the quick-add buttons).
    pub fn nudge_bid(&self, delta: Decimal) -> Decimal {
        self.bidding.nudge(delta)
    }

    pub fn bid_increment(&self) -> Option<Decimal> {
        self.snapshot
            .as_ref()
            .map(|snapshot| snapshot.bid_increment)
    }

    /// Purely a presentation preference; gates the cue sink, never the
    /// state machine.
    pub fn toggle_sound(&mut self, enabled: bool) {
        self.sounds_enabled = enabled;
    }

    pub async fn reconnect_chat(&mut self) -> Result<(), Error> {
        Ok(self.chat_feed.connect().await?)
    }

    pub async fn send_chat(&self, text: &str) -> Result<(), Error> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        Ok(self
            .chat_feed
            .send(&OutboundChat { message: text.to_string() })
            .await?)
    }

    /// Append one inbound chat message to the transcript.
    pub fn push_chat(&mut self, message: ChatMessage) {
        self.chat.push(message);
    }

    pub fn state(&self) -> LiveAuctionState {
        let (item_name, current_price, minimum_bid) = match &self.snapshot
        {
            Some(snapshot) => (
                snapshot.item_name.clone(),
                snapshot.current_price,
                snapshot.minimum_bid(),
            ),
            None => (String::new(), Decimal::ZERO, Decimal::ZERO),
        };
        LiveAuctionState {
            item_name,
            current_price,
            minimum_bid,
            pending_amount: self.bidding.pending_amount(),
            countdown: self.countdown,
            frozen: self.frozen,
            bids: self.bids.clone(),
            chat: self.chat.clone(),
            auction_feed: self.auction_feed.status(),
            chat_feed: self.chat_feed.status(),
            notice: self.notice.clone(),
        }
    }

    /// Release both subscriptions; the driver stops the tick on its side.
    pub async fn shutdown(&mut self) {
        self.auction_feed.close().await;
        self.chat_feed.close().await;
    }

    /// First closure signal wins, whether it came from the clock or from
    /// the server; the second is a confirming no-op.
    fn close_out(&mut self, notice: String) {
        if self.frozen {
            debug!("Already closed, ignoring the duplicate signal");
            return;
        }
        info!("The auction is over: {}", notice);
        self.frozen = true;
        self.bidding.freeze();
        self.notice = Some(notice);
        self.play(Cue::Hammer);
    }

    fn play(&self, cue: Cue) {
        if self.sounds_enabled {
            self.cues.play(cue);
        }
    }

    fn install_snapshot(&mut self, snapshot: AuctionSnapshot) {
        // Re-seed only when the targets moved so the 3/2/1 one-shots are
        // not re-armed mid-run by an ordinary refresh
        if self.clock.end() != snapshot.end_time {
            self.clock.reseed(snapshot.start_time, snapshot.end_time);
        }
        self.bidding
            .observe_floor(snapshot.current_price, snapshot.bid_increment);
        let mut bids = snapshot.bids.clone();
        sort_for_display(&mut bids);
        self.bids = bids;
        let status = snapshot.status;
        self.snapshot = Some(snapshot);
        // The server-side status is authoritative for closure
        if status == AuctionStatus::Ended {
            self.close_out("This auction is now closed".to_string());
        }
    }

    /// Wholesale snapshot replacement; a failed refresh keeps whatever
    /// was already on display.
    async fn refresh_snapshot(&mut self) {
        match self.api.fetch_auction(self.auction_id).await {
            Ok(snapshot) => match snapshot.validate() {
                Ok(()) => self.install_snapshot(snapshot),
                Err(err) => {
                    warn!("Refusing an inconsistent snapshot: {}", err)
                }
            },
            Err(err) => {
                warn!("Could not refresh the auction: {}", err);
            }
        }
    }

    async fn refresh_bids(&mut self) {
        match self.api.fetch_bids(self.auction_id).await {
            Ok(mut bids) => {
                sort_for_display(&mut bids);
                self.bids = bids;
            }
            Err(err) => {
                warn!("Could not refresh the bid list: {}", err);
            }
        }
    }
}
