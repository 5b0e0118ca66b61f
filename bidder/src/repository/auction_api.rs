use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use helper::reqwest_helper::deserialize_response;
use helper::settings::{ApiBaseUrl, AuthToken};
use model::dto::auction::{AuctionSnapshot, BidRecord};
use model::view::bid::{ApiErrorBody, PlaceBidReply, PlaceBidRequest};
use model::view::chat::ChatMessage;
use model::AuctionId;
use tracing::trace;

type HttpClient = reqwest_middleware::ClientWithMiddleware;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    Middleware(#[from] reqwest_middleware::Error),
    #[error("The request failed with error code: {0}")]
    RequestStatus(reqwest::StatusCode),
    /// The server refused a well-formed bid; the message is user-facing.
    #[error("{message}")]
    Rejected { message: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// REST contract of the auction backend, behind a trait so the services
/// can be exercised against a recording fake.
#[async_trait]
pub trait AuctionApi: Debug + Sync + Send {
    async fn fetch_auction(
        &self,
        id: AuctionId,
    ) -> Result<AuctionSnapshot, Error>;
    /// The backend nests the bid list inside the detail payload; this is
    /// the lighter refresh that only cares about that list.
    async fn fetch_bids(
        &self,
        id: AuctionId,
    ) -> Result<Vec<BidRecord>, Error>;
    async fn place_bid(
        &self,
        request: &PlaceBidRequest,
    ) -> Result<PlaceBidReply, Error>;
    /// Messages exchanged before we joined, oldest first.
    async fn fetch_chat_history(
        &self,
        id: AuctionId,
    ) -> Result<Vec<ChatMessage>, Error>;
}

#[derive(Debug)]
pub struct AuctionApiRest {
    client: Arc<HttpClient>,
    base:   ApiBaseUrl,
    token:  AuthToken,
}

impl AuctionApiRest {
    pub fn new(
        client: Arc<HttpClient>,
        base: ApiBaseUrl,
        token: AuthToken,
    ) -> Self {
        Self { client, base, token }
    }

    fn detail_url(&self, id: AuctionId) -> String {
        format!("{}/auctions/{}/", self.base, id)
    }

    async fn get_detail(
        &self,
        id: AuctionId,
    ) -> Result<AuctionSnapshot, Error> {
        let response = self
            .client
            .get(self.detail_url(id))
            .bearer_auth(self.token.clone().into_inner())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::RequestStatus(response.status()));
        }
        Ok(deserialize_response(response).await?)
    }
}

#[async_trait]
impl AuctionApi for AuctionApiRest {
    async fn fetch_auction(
        &self,
        id: AuctionId,
    ) -> Result<AuctionSnapshot, Error> {
        trace!("Fetching auction {}", id);
        self.get_detail(id).await
    }

    async fn fetch_bids(
        &self,
        id: AuctionId,
    ) -> Result<Vec<BidRecord>, Error> {
        trace!("Fetching the bid list of auction {}", id);
        Ok(self.get_detail(id).await?.bids)
    }

    async fn place_bid(
        &self,
        request: &PlaceBidRequest,
    ) -> Result<PlaceBidReply, Error> {
        trace!(
            "Placing a bid of {} on auction {}",
            request.bid_amount,
            request.auction_id
        );
        let response = self
            .client
            .post(format!("{}/bid/place/", self.base))
            .bearer_auth(self.token.clone().into_inner())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(deserialize_response(response).await?);
        }

        // A readable error body is a business rejection, anything else is
        // transport
        let body = response.bytes().await?;
        match serde_json::from_slice::<ApiErrorBody>(&body)
            .ok()
            .and_then(|parsed| parsed.message().map(str::to_string))
        {
            Some(message) => Err(Error::Rejected { message }),
            None => Err(Error::RequestStatus(status)),
        }
    }

    async fn fetch_chat_history(
        &self,
        id: AuctionId,
    ) -> Result<Vec<ChatMessage>, Error> {
        trace!("Fetching the chat history of auction {}", id);
        let response = self
            .client
            .get(format!("{}/auctions/{}/chat/", self.base, id))
            .bearer_auth(self.token.clone().into_inner())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::RequestStatus(response.status()));
        }
        Ok(deserialize_response(response).await?)
    }
}
