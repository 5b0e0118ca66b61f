use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use helper::init::{get_subscriber, init_subscriber};
use helper::settings::{ApiBaseUrl, AuthToken, WsBaseUrl};
use helper::{env_load, env_load_or, env_var};
use model::view::bid::BidOutcome;
use model::AuctionId;
use reqwest_middleware::ClientBuilder;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::repository::auction_api::AuctionApiRest;
use crate::repository::channel::LiveChannel;
use crate::service::live_auction::{Cue, CueSink, LiveAuction};

mod repository;
mod service;

env_var!(API_BASE_URL);
env_var!(WS_BASE_URL);
env_var!(AUTH_TOKEN);
env_var!(AUCTION_ID);

/// Renders the cue events on the console; a real front end would play
/// the oscillator sounds here.
#[derive(Debug)]
struct ConsoleCues;

impl CueSink for ConsoleCues {
    fn play(&self, cue: Cue) {
        match cue {
            Cue::Countdown(n) => info!("*beep* {n}..."),
            Cue::Hammer => info!("*hammer* Sold!"),
            Cue::Extension => info!("*chime* The end time moved"),
        }
    }
}

fn print_state(live: &LiveAuction) {
    let state = live.state();
    let countdown = state.countdown;
    println!(
        "{} | {} | {:02}d {:02}h {:02}m {:02}s | current {} | min {} | \
         next {} | feed {} | chat {}",
        state.item_name,
        if state.frozen { "ended" } else { "live" },
        countdown.days,
        countdown.hours,
        countdown.minutes,
        countdown.seconds,
        state.current_price,
        state.minimum_bid,
        state
            .pending_amount
            .map(|amount| amount.to_string())
            .unwrap_or_else(|| "-".to_string()),
        state.auction_feed,
        state.chat_feed,
    );
    if let Some(notice) = state.notice {
        println!(">> {notice}");
    }
}

fn print_help() {
    println!(
        "commands: bid <amount> | + | say <text> | sound on|off | \
         reconnect | status | quit"
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (subscriber, _log_guard) =
        get_subscriber("bidder".into(), "info".into());
    init_subscriber(subscriber);
    debug!("Tracing initialized.");

    let api_base =
        env_load_or!(ApiBaseUrl, API_BASE_URL, "http://localhost:8000");
    let ws_base = env_load_or!(WsBaseUrl, WS_BASE_URL, "ws://localhost:8000");
    let token = env_load!(AuthToken, AUTH_TOKEN);
    let auction_id = AuctionId::from_str(
        &std::env::var(AUCTION_ID)
            .with_context(|| format!("Missing {} env var", AUCTION_ID))?,
    )
    .with_context(|| format!("{} must be an integer", AUCTION_ID))?;

    let http_client =
        Arc::new(ClientBuilder::new(reqwest::Client::new()).build());
    let api = Arc::new(AuctionApiRest::new(
        http_client,
        api_base,
        token.clone(),
    ));

    let auction_feed = LiveChannel::new(
        format!("{}/ws/auctions/{}/", ws_base, auction_id),
        "auction",
    );
    let chat_feed = LiveChannel::new(
        format!(
            "{}/ws/auctions/{}/chat/?token={}",
            ws_base,
            auction_id,
            token.clone().into_inner()
        ),
        "chat",
    );

    let mut live = LiveAuction::new(
        api,
        auction_id,
        auction_feed,
        chat_feed,
        Arc::new(ConsoleCues),
    );
    live.open().await?;

    let mut auction_events = live
        .take_auction_events()
        .context("The auction event receiver was already taken")?;
    let mut chat_messages = live
        .take_chat_messages()
        .context("The chat message receiver was already taken")?;

    info!("Joined auction {}, type 'help' for commands", auction_id);
    print_state(&live);

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                live.handle_tick(Utc::now());
            }
            Some(event) = auction_events.recv() => {
                live.handle_event(event).await;
                print_state(&live);
            }
            Some(message) = chat_messages.recv() => {
                println!("[chat] {}: {}", message.user, message.message);
                live.push_chat(message);
            }
            line = lines.next_line() => {
                let Ok(Some(line)) = line else {
                    break;
                };
                if !dispatch(&mut live, line.trim()).await {
                    break;
                }
            }
        }
    }

    live.shutdown().await;
    info!("Left the auction");
    Ok(())
}

/// One console command; returns false when the user wants out.
async fn dispatch(live: &mut LiveAuction, line: &str) -> bool {
    match line.split_once(' ').unwrap_or((line, "")) {
        ("quit", _) | ("exit", _) => return false,
        ("help", _) => print_help(),
        ("status", _) => print_state(live),
        ("bid", amount) => match live.place_bid(amount).await {
            BidOutcome::Accepted { new_price } => {
                println!("Bid placed successfully! Current: {new_price}");
                print_state(live);
            }
            BidOutcome::AcceptedWithExtension {
                new_price,
                extended_by_seconds,
            } => {
                println!(
                    "Bid placed, auction extended by \
                     {extended_by_seconds}s! Current: {new_price}"
                );
                print_state(live);
            }
            BidOutcome::Rejected { reason } => println!("{reason}"),
            BidOutcome::TransportError { reason } => {
                println!("Could not reach the server ({reason}), try again")
            }
            BidOutcome::AlreadySubmitting => {
                println!("Hold on, your previous bid is still going out")
            }
        },
        ("+", _) => match live.bid_increment() {
            Some(increment) => {
                println!("Next bid: {}", live.nudge_bid(increment))
            }
            None => println!("The auction is not loaded yet"),
        },
        ("say", text) => {
            if let Err(err) = live.send_chat(text).await {
                warn!("Could not send the chat message: {}", err);
                println!("Chat is down, try 'reconnect'");
            }
        }
        ("sound", setting) => match setting {
            "on" => live.toggle_sound(true),
            "off" => live.toggle_sound(false),
            _ => println!("usage: sound on|off"),
        },
        ("reconnect", _) => match live.reconnect_chat().await {
            Ok(()) => println!("Chat reconnected"),
            Err(err) => println!("Chat reconnect failed: {err}"),
        },
        _ => print_help(),
    }
    true
}
