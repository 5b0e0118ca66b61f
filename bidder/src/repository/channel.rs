use std::sync::{Arc, Mutex};

use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use model::domain::channel::ChannelStatus;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{
    connect_async, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, trace, warn};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to establish the websocket connection: {0}")]
    Connect(#[source] tokio_tungstenite::tungstenite::Error),
    #[error("The channel is not connected")]
    NotConnected,
    #[error("Failed to send on the channel: {0}")]
    Send(#[source] tokio_tungstenite::tungstenite::Error),
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

/// One reconnectable push subscription, parameterized by the inbound
/// payload type. The auction event feed and the chat feed are two
/// independent instances of this; their reconnect state never mixes.
///
/// Reconnection is manual: a read error or server close only flips the
/// status to `Disconnected`, and a later [`connect`](Self::connect) call
/// tears any stale socket down before dialing again.
pub struct LiveChannel<E> {
    url:    String,
    label:  &'static str,
    status: Arc<Mutex<ChannelStatus>>,
    events_tx: mpsc::UnboundedSender<E>,
    events_rx: Option<mpsc::UnboundedReceiver<E>>,
    writer: Arc<tokio::sync::Mutex<Option<WsSink>>>,
    reader: Option<JoinHandle<()>>,
}

impl<E> LiveChannel<E>
where
    E: DeserializeOwned + Send + 'static,
{
    pub fn new(url: String, label: &'static str) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            url,
            label,
            status: Arc::new(Mutex::new(ChannelStatus::Disconnected)),
            events_tx,
            events_rx: Some(events_rx),
            writer: Arc::new(tokio::sync::Mutex::new(None)),
            reader: None,
        }
    }

    /// The receiving end of the subscription; can be taken once and
    /// survives reconnects.
    pub fn events(&mut self) -> Option<mpsc::UnboundedReceiver<E>> {
        self.events_rx.take()
    }

    pub fn status(&self) -> ChannelStatus {
        *self.status.lock().unwrap()
    }

    /// Dial the subscription. Idempotent: any previous socket and reader
    /// task are released first, so repeated reconnects never leak.
    pub async fn connect(&mut self) -> Result<(), Error> {
        self.teardown().await;
        self.set_status(ChannelStatus::Connecting);
        debug!("Connecting the {} channel", self.label);

        let (stream, _) = match connect_async(self.url.as_str()).await {
            Ok(ok) => ok,
            Err(source) => {
                self.set_status(ChannelStatus::Disconnected);
                return Err(Error::Connect(source));
            }
        };
        let (sink, mut read) = stream.split();
        *self.writer.lock().await = Some(sink);
        self.set_status(ChannelStatus::Connected);
        debug!("The {} channel is connected", self.label);

        let status = self.status.clone();
        let events_tx = self.events_tx.clone();
        let label = self.label;
        self.reader = Some(tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<E>(text.as_str()) {
                            Ok(event) => {
                                if events_tx.send(event).is_err() {
                                    break;
                                }
                            }
                            // A frame we cannot read must not kill the
                            // subscription
                            Err(err) => warn!(
                                "Skipping an unreadable frame on the {} \
                                 channel: {}",
                                label, err
                            ),
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("The server closed the {} channel", label);
                        break;
                    }
                    Ok(other) => {
                        trace!(
                            "Ignoring a non-text frame on the {} channel: \
                             {:?}",
                            label,
                            other
                        );
                    }
                    Err(err) => {
                        warn!(
                            "Read error on the {} channel: {}",
                            label, err
                        );
                        break;
                    }
                }
            }
            *status.lock().unwrap() = ChannelStatus::Disconnected;
        }));

        Ok(())
    }

    /// Push one JSON payload to the server (used by the chat feed).
    pub async fn send<T: Serialize>(
        &self,
        payload: &T,
    ) -> Result<(), Error> {
        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut().ok_or(Error::NotConnected)?;
        let text = serde_json::to_string(payload)?;
        sink.send(Message::Text(text.into())).await.map_err(|source| {
            *self.status.lock().unwrap() = ChannelStatus::Disconnected;
            Error::Send(source)
        })
    }

    /// Release the subscription. No event is delivered past this point.
    pub async fn close(&mut self) {
        self.teardown().await;
        self.set_status(ChannelStatus::Disconnected);
        debug!("Closed the {} channel", self.label);
    }

    async fn teardown(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(mut sink) = self.writer.lock().await.take() {
            let _ = sink.close().await;
        }
    }

    fn set_status(&self, status: ChannelStatus) {
        *self.status.lock().unwrap() = status;
    }
}
