use std::sync::Arc;

use anyhow::{bail, Result};
use serde_json::Value as Json;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::{
    config::Config,
    core::{
        authorization_request::AuthorizationUri, util::AsyncHttpClient, visual_code::VisualEncoder,
    },
    Error,
};

use client::{PresentationRequester, RequestClient};
use medication::MedicationLookup;
use notification::{ChannelError, NotificationChannel, Subscription, Transport};
use result::{recognize, Prescription, PresentationResult};
use session::{PresentationSession, SessionEvent, Status};

pub mod client;
pub mod medication;
pub mod notification;
pub mod result;
pub mod session;
#[cfg(feature = "websocket")]
pub mod websocket;

/// Capacity of the [SessionEvent] channel; slow receivers observe a lag beyond it.
const EVENT_CAPACITY: usize = 16;

/// What the notification subscription forwards to the orchestrator.
#[derive(Debug)]
enum Inbound {
    Message(Json),
    Error(ChannelError),
}

/// Drives one presentation session at a time: request a transaction from the verifier, expose
/// its authorization URI to the wallet, then wait for the verification result pushed back.
///
/// ```ignore
/// let mut orchestrator = Orchestrator::builder()
///     .with_config(Config::from_env()?)
///     .with_http_client(Arc::new(ReqwestClient::new()?))
///     .with_transport(Arc::new(WebSocketTransport))
///     .build()?;
///
/// let session = orchestrator.start(Some("SmartHealthCard")).await?;
/// println!("{}", session.authorization_uri().unwrap());
///
/// let result = orchestrator.wait_for_result().await?;
/// ```
///
/// Cancelling is done by dropping the pending future and calling [Orchestrator::reset].
#[derive(Debug)]
pub struct Orchestrator {
    requester: Arc<dyn PresentationRequester + Send + Sync>,
    notifications: NotificationChannel,
    visual_encoder: Option<Arc<dyn VisualEncoder + Send + Sync>>,
    medication_lookup: Option<Arc<dyn MedicationLookup + Send + Sync>>,
    session: PresentationSession,
    subscription: Option<Subscription>,
    inbox: Option<mpsc::UnboundedReceiver<Inbound>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// The current session.
    pub fn session(&self) -> &PresentationSession {
        &self.session
    }

    pub fn status(&self) -> Status {
        self.session.status
    }

    /// Receive the lifecycle events of every session run by this orchestrator.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Start a session requesting a `credential_type` credential.
    ///
    /// A completed or failed session is replaced. A pending one is left untouched and
    /// [Error::SessionBusy] is returned.
    ///
    /// ## Returns
    /// The session, awaiting its result.
    pub async fn start(
        &mut self,
        credential_type: Option<&str>,
    ) -> Result<&PresentationSession, Error> {
        if self.session.status.is_pending() {
            return Err(Error::SessionBusy);
        }

        let credential_type = match credential_type.map(str::trim) {
            Some(credential_type) if !credential_type.is_empty() => credential_type.to_owned(),
            _ => return Err(Error::invalid_argument("credential type is required")),
        };

        if self.session.status != Status::Initial {
            self.reset();
        }

        self.session.credential_type = Some(credential_type.clone());
        self.transition(Status::Requested);
        self.emit(SessionEvent::Requested {
            credential_type: credential_type.clone(),
        });

        match self.open(&credential_type).await {
            Ok(()) => Ok(&self.session),
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn open(&mut self, credential_type: &str) -> Result<(), Error> {
        let uri = self.requester.request_presentation(credential_type).await?;
        let authorization_uri: AuthorizationUri = uri.parse()?;
        let session_id = authorization_uri.state()?.0;
        debug!(
            session = %self.session.uuid,
            %session_id,
            client_id = ?authorization_uri.client_id().map(|id| id.0),
            "transaction created"
        );

        let visual_code = match &self.visual_encoder {
            Some(encoder) => Some(encoder.encode(&uri).await?),
            None => None,
        };

        let (messages, inbox) = mpsc::unbounded_channel();
        let errors = messages.clone();
        let subscription = self
            .notifications
            .subscribe(
                &session_id,
                // The orchestrator may have moved on; late deliveries are dropped.
                move |message| {
                    let _ = messages.send(Inbound::Message(message));
                },
                move |e| {
                    let _ = errors.send(Inbound::Error(e));
                },
            )
            .await?;

        self.subscription = Some(subscription);
        self.inbox = Some(inbox);
        self.session.session_id = Some(session_id.clone());
        self.session.authorization_uri = Some(authorization_uri.clone());
        self.session.visual_code = visual_code.clone();
        self.transition(Status::AwaitingResult);
        self.emit(SessionEvent::AwaitingResult {
            session_id,
            authorization_uri,
            visual_code,
        });

        Ok(())
    }

    /// Handle one message pushed by the verifier.
    ///
    /// A prescription is completed with its medication's directory identifier when a
    /// [MedicationLookup] is configured; a failed lookup still completes the session.
    ///
    /// ## Returns
    /// Whether the message completed the session. Messages that are not verification results, or
    /// that arrive while no session is awaiting one, are ignored.
    pub async fn on_notification(&mut self, message: Json) -> bool {
        if self.session.status != Status::AwaitingResult {
            debug!(session = %self.session.uuid, status = %self.session.status, "ignoring notification");
            return false;
        }

        let Some(mut result) = recognize(&message) else {
            debug!(session = %self.session.uuid, "notification is not a verification result");
            return false;
        };

        if let PresentationResult::Prescription(prescription) = &mut result {
            self.resolve_medication(prescription).await;
        }

        self.close_subscription();
        let result = Arc::new(result);
        self.session.result = Some(result.clone());
        self.transition(Status::Completed);
        self.emit(SessionEvent::Completed(result));
        true
    }

    async fn resolve_medication(&self, prescription: &mut Prescription) {
        let Some(lookup) = &self.medication_lookup else {
            return;
        };
        let Some(gtin) = prescription
            .gtin()
            .filter(|gtin| !gtin.is_empty())
            .map(ToOwned::to_owned)
        else {
            return;
        };

        match lookup.medication_pid(&gtin).await {
            Ok(pid) => {
                debug!(session = %self.session.uuid, %gtin, %pid, "medication resolved");
                prescription.medication_pid = Some(pid);
            }
            Err(e) => {
                warn!(session = %self.session.uuid, %gtin, "medication lookup failed: {e}")
            }
        }
    }

    /// Process pushed messages until the session completes or fails.
    ///
    /// Resolves immediately for a session that is already settled.
    pub async fn wait_for_result(&mut self) -> Result<Arc<PresentationResult>, Error> {
        loop {
            if let Some(result) = &self.session.result {
                return Ok(result.clone());
            }
            if let Some(error) = &self.session.error {
                return Err(error.as_ref().clone());
            }
            if self.session.status != Status::AwaitingResult {
                return Err(Error::NotAwaiting);
            }

            let inbound = match self.inbox.as_mut() {
                Some(inbox) => inbox.recv().await,
                None => None,
            };

            match inbound {
                Some(Inbound::Message(message)) => {
                    self.on_notification(message).await;
                }
                Some(Inbound::Error(e)) => return Err(self.fail(e.into())),
                None => return Err(self.fail(ChannelError::Closed.into())),
            }
        }
    }

    /// Abandon the current session, closing its notification channel.
    ///
    /// Resetting a session that was never started has no effect.
    pub fn reset(&mut self) {
        self.close_subscription();

        if self.session.status == Status::Initial {
            self.session.result = None;
            self.session.error = None;
            self.session.visual_code = None;
            return;
        }

        debug!(session = %self.session.uuid, status = %self.session.status, "resetting session");
        self.session = PresentationSession::default();
        self.emit(SessionEvent::Reset);
    }

    fn fail(&mut self, error: Error) -> Error {
        warn!(session = %self.session.uuid, "presentation session failed: {error}");
        self.close_subscription();
        let shared = Arc::new(error.clone());
        self.session.error = Some(shared.clone());
        self.transition(Status::Failed);
        self.emit(SessionEvent::Failed(shared));
        error
    }

    fn close_subscription(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
        }
        self.inbox = None;
    }

    fn transition(&mut self, status: Status) {
        debug!(session = %self.session.uuid, from = %self.session.status, to = %status, "session status");
        self.session.status = status;
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is not an error.
        let _ = self.events.send(event);
    }
}

/// Builder struct for [Orchestrator].
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: Option<Config>,
    http_client: Option<Arc<dyn AsyncHttpClient + Send + Sync>>,
    requester: Option<Arc<dyn PresentationRequester + Send + Sync>>,
    transport: Option<Arc<dyn Transport>>,
    visual_encoder: Option<Arc<dyn VisualEncoder + Send + Sync>>,
    medication_lookup: Option<Arc<dyn MedicationLookup + Send + Sync>>,
}

impl std::fmt::Debug for OrchestratorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorBuilder")
            .field("config", &self.config)
            .field("requester", &self.requester)
            .field("transport", &self.transport)
            .field("visual_encoder", &self.visual_encoder)
            .field("medication_lookup", &self.medication_lookup)
            .finish_non_exhaustive()
    }
}

impl OrchestratorBuilder {
    /// Build the orchestrator.
    pub fn build(self) -> Result<Orchestrator> {
        let Self {
            config,
            http_client,
            requester,
            transport,
            visual_encoder,
            medication_lookup,
        } = self;

        let Some(config) = config else {
            bail!("config is required, see `with_config`")
        };

        let requester = match (requester, http_client) {
            (Some(requester), _) => requester,
            (None, Some(http_client)) => Arc::new(RequestClient::new(config.clone(), http_client)),
            (None, None) => {
                bail!("an http client is required, see `with_http_client` or `with_requester`")
            }
        };

        let Some(transport) = transport else {
            bail!("a notification transport is required, see `with_transport`")
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Orchestrator {
            requester,
            notifications: NotificationChannel::new(config, transport),
            visual_encoder,
            medication_lookup,
            session: PresentationSession::default(),
            subscription: None,
            inbox: None,
            events,
        })
    }

    /// Set the location of the verifier service.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the client used to create transactions with the verifier.
    pub fn with_http_client(mut self, http_client: Arc<dyn AsyncHttpClient + Send + Sync>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Create transactions through `requester` instead of the verifier's `vp/request` endpoint.
    pub fn with_requester(
        mut self,
        requester: Arc<dyn PresentationRequester + Send + Sync>,
    ) -> Self {
        self.requester = Some(requester);
        self
    }

    /// Set the transport carrying the verifier's push notifications.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Encode every authorization URI as a visual code, e.g. with a
    /// [QrCodeService](crate::core::visual_code::QrCodeService).
    pub fn with_visual_encoder(mut self, encoder: Arc<dyn VisualEncoder + Send + Sync>) -> Self {
        self.visual_encoder = Some(encoder);
        self
    }

    /// Resolve the medication of every prescription result, e.g. with a
    /// [MedicationDirectory](medication::MedicationDirectory).
    pub fn with_medication_lookup(
        mut self,
        lookup: Arc<dyn MedicationLookup + Send + Sync>,
    ) -> Self {
        self.medication_lookup = Some(lookup);
        self
    }
}
