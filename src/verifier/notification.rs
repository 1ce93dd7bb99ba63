use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use serde_json::Value as Json;
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{debug, error, warn};
use url::Url;

use crate::{config::Config, Error};

/// Failure of the push channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("unable to connect: {0}")]
    Connect(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("the channel was closed")]
    Closed,
}

/// Opens message-oriented connections to the verifier.
#[async_trait]
pub trait Transport: Debug + Send + Sync {
    async fn connect(&self, target: &Url) -> Result<Box<dyn Connection>, ChannelError>;
}

/// One open connection, yielding text frames.
#[async_trait]
pub trait Connection: Send {
    /// The next text frame, or `None` once the peer has closed the connection.
    async fn recv(&mut self) -> Option<Result<String, ChannelError>>;

    async fn close(&mut self) -> Result<(), ChannelError>;
}

/// Push notifications from the verifier, keyed by session identifier.
#[derive(Debug, Clone)]
pub struct NotificationChannel {
    config: Config,
    transport: Arc<dyn Transport>,
}

impl NotificationChannel {
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Connect to the notifications of `session_id`.
    ///
    /// Every frame that parses as JSON is handed to `on_message`; other frames are dropped.
    /// A connection error is reported once to `on_error` and ends the subscription, which is not
    /// re-established.
    pub async fn subscribe<M, E>(
        &self,
        session_id: &str,
        mut on_message: M,
        mut on_error: E,
    ) -> Result<Subscription, Error>
    where
        M: FnMut(Json) + Send + 'static,
        E: FnMut(ChannelError) + Send + 'static,
    {
        if session_id.is_empty() {
            return Err(Error::invalid_argument("session identifier is required"));
        }

        let endpoint = self
            .config
            .notification_endpoint(session_id)
            .map_err(|e| Error::invalid_argument(format!("{e:#}")))?;

        debug!(%endpoint, "subscribing to notifications");
        let mut connection = self.transport.connect(&endpoint).await?;

        let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        if let Err(e) = connection.close().await {
                            debug!("error while closing the notification channel: {e}");
                        }
                        break;
                    }
                    frame = connection.recv() => match frame {
                        Some(Ok(text)) => match serde_json::from_str::<Json>(&text) {
                            Ok(message) => on_message(message),
                            Err(e) => warn!(frame = %text, "dropping unparseable notification: {e}"),
                        },
                        Some(Err(e)) => {
                            error!(%endpoint, "notification channel failed: {e}");
                            on_error(e);
                            break;
                        }
                        None => {
                            debug!(%endpoint, "notification channel closed by the verifier");
                            break;
                        }
                    },
                }
            }
        });

        Ok(Subscription {
            shutdown: Some(shutdown),
            task,
        })
    }
}

/// Handle of an open subscription. Dropping it closes the connection.
#[derive(Debug)]
pub struct Subscription {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Close the connection. Calling this more than once has no further effect.
    pub fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // The task may already be gone if the peer closed first.
            let _ = shutdown.send(());
        }
    }

    /// Whether the connection is still being read.
    pub fn is_open(&self) -> bool {
        self.shutdown.is_some() && !self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close()
    }
}
