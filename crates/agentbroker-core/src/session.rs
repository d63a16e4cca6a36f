//! Session broker — opens conversations through chat adapters.
//!
//! Opening a session walks an explicit negotiation state machine:
//!
//! ```text
//! IDLE ─┬─(preference ≠ disabled)→ NEGOTIATING_ENCRYPTED ─┬─ok→ ESTABLISHED(encrypted)
//!       │                                                 ├─err, required→ FAILED
//!       │                                                 └─err, preferred─┐
//!       └─(preference = disabled)→ FALLING_BACK_PLAINTEXT ←────────────────┘
//!                                    ├─ok→ ESTABLISHED(plaintext)
//!                                    └─err→ FAILED
//! ```
//!
//! Resuming a known session id skips negotiation and is always plaintext.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::adapter::{ChatAdapter, ChatReply, SendOptions, SessionOpened, SessionOptions};
use crate::agent::SessionTarget;
use crate::error::{BrokerError, BrokerResult};
use crate::registry::AdapterRegistry;
use crate::retry::RetryPolicy;

/// How hard the broker tries to encrypt a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionPreference {
    /// Try encrypted first, fall back to plaintext.
    #[default]
    Preferred,
    /// Encrypted or nothing.
    Required,
    /// Plaintext only.
    Disabled,
}

impl std::fmt::Display for EncryptionPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncryptionPreference::Preferred => write!(f, "preferred"),
            EncryptionPreference::Required => write!(f, "required"),
            EncryptionPreference::Disabled => write!(f, "disabled"),
        }
    }
}

impl std::str::FromStr for EncryptionPreference {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preferred" => Ok(Self::Preferred),
            "required" => Ok(Self::Required),
            "disabled" => Ok(Self::Disabled),
            other => Err(BrokerError::validation(format!(
                "unknown encryption preference '{other}'"
            ))),
        }
    }
}

/// Transport mode of an established session. Fixed for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Encrypted,
    Plaintext,
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionMode::Encrypted => write!(f, "encrypted"),
            SessionMode::Plaintext => write!(f, "plaintext"),
        }
    }
}

// ── Negotiation state machine ────────────────────────────────

/// Negotiation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negotiation {
    Idle,
    NegotiatingEncrypted,
    FallingBackPlaintext,
    Established(SessionMode),
    Failed,
}

/// What happened in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationEvent {
    /// Start negotiating (only valid from `Idle`).
    Begin,
    /// The adapter call for the current state succeeded.
    Succeeded,
    /// The adapter call for the current state failed.
    Errored,
}

impl Negotiation {
    /// The state after `event` under `preference`.
    pub fn advance(
        self,
        preference: EncryptionPreference,
        event: NegotiationEvent,
    ) -> Result<Self, InvalidTransition> {
        use EncryptionPreference as P;
        use Negotiation as N;
        use NegotiationEvent as E;

        let next = match (self, event, preference) {
            (N::Idle, E::Begin, P::Disabled) => N::FallingBackPlaintext,
            (N::Idle, E::Begin, P::Preferred | P::Required) => N::NegotiatingEncrypted,
            (N::NegotiatingEncrypted, E::Succeeded, P::Preferred | P::Required) => {
                N::Established(SessionMode::Encrypted)
            }
            (N::NegotiatingEncrypted, E::Errored, P::Required) => N::Failed,
            (N::NegotiatingEncrypted, E::Errored, P::Preferred) => N::FallingBackPlaintext,
            (N::FallingBackPlaintext, E::Succeeded, _) => N::Established(SessionMode::Plaintext),
            (N::FallingBackPlaintext, E::Errored, _) => N::Failed,
            (from, event, preference) => {
                return Err(InvalidTransition {
                    from,
                    event,
                    preference,
                })
            }
        };
        Ok(next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Negotiation::Established(_) | Negotiation::Failed)
    }
}

impl std::fmt::Display for Negotiation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Negotiation::Idle => write!(f, "IDLE"),
            Negotiation::NegotiatingEncrypted => write!(f, "NEGOTIATING_ENCRYPTED"),
            Negotiation::FallingBackPlaintext => write!(f, "FALLING_BACK_PLAINTEXT"),
            Negotiation::Established(mode) => write!(f, "ESTABLISHED({mode})"),
            Negotiation::Failed => write!(f, "FAILED"),
        }
    }
}

/// Error for invalid negotiation transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: Negotiation,
    pub event: NegotiationEvent,
    pub preference: EncryptionPreference,
}

impl std::fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid negotiation transition from {} on {:?} (encryption {})",
            self.from, self.event, self.preference
        )
    }
}

impl std::error::Error for InvalidTransition {}

impl From<InvalidTransition> for BrokerError {
    fn from(err: InvalidTransition) -> Self {
        BrokerError::configuration(err.to_string())
    }
}

// ── Requests and handles ─────────────────────────────────────

/// Request to open (or resume) a session.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenRequest {
    pub target: SessionTarget,
    /// Chat adapter id; the broker default when unset.
    pub adapter: Option<String>,
    pub encryption: EncryptionPreference,
    /// Continue an existing session instead of negotiating a new one.
    pub resume_session_id: Option<String>,
    pub options: SessionOptions,
}

impl OpenRequest {
    pub fn new(target: SessionTarget) -> Self {
        Self {
            target,
            adapter: None,
            encryption: EncryptionPreference::default(),
            resume_session_id: None,
            options: SessionOptions::default(),
        }
    }

    pub fn adapter(mut self, id: impl Into<String>) -> Self {
        self.adapter = Some(id.into());
        self
    }

    pub fn encryption(mut self, preference: EncryptionPreference) -> Self {
        self.encryption = preference;
        self
    }

    pub fn resume(mut self, session_id: impl Into<String>) -> Self {
        self.resume_session_id = Some(session_id.into());
        self
    }

    pub fn history_ttl(mut self, ttl: Duration) -> Self {
        self.options.history_ttl = Some(ttl);
        self
    }

    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.options.metadata = metadata;
        self
    }
}

/// An established conversation.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: String,
    mode: SessionMode,
    target: SessionTarget,
    adapter: Arc<dyn ChatAdapter>,
    retry: RetryPolicy,
    opened_at: DateTime<Utc>,
    resumed: bool,
    encryption_fallback: Option<BrokerError>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn target(&self) -> &SessionTarget {
        &self.target
    }

    /// Id of the chat adapter carrying this session.
    pub fn adapter_id(&self) -> &str {
        self.adapter.id()
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Whether this handle continues a session opened elsewhere.
    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    /// Why encrypted negotiation was abandoned, when a `preferred` session
    /// fell back to plaintext.
    pub fn encryption_fallback(&self) -> Option<&BrokerError> {
        self.encryption_fallback.as_ref()
    }

    /// Send one message and wait for the agent's reply.
    pub async fn send(&self, message: &str) -> BrokerResult<ChatReply> {
        if message.trim().is_empty() {
            return Err(BrokerError::validation("message is empty"));
        }
        let options = SendOptions { mode: self.mode };
        tracing::debug!(
            session_id = %self.session_id,
            adapter = self.adapter.id(),
            mode = %self.mode,
            "Sending chat message"
        );
        self.retry
            .execute("chat.send_message", || {
                self.adapter
                    .send_message(&self.session_id, message, &options)
            })
            .await
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .field("mode", &self.mode)
            .field("target", &self.target)
            .field("adapter", &self.adapter.id())
            .field("opened_at", &self.opened_at)
            .field("resumed", &self.resumed)
            .finish_non_exhaustive()
    }
}

// ── Broker ───────────────────────────────────────────────────

/// Opens sessions against resolved targets.
#[derive(Debug, Clone)]
pub struct SessionBroker {
    registry: Arc<AdapterRegistry>,
    retry: RetryPolicy,
    default_adapter: String,
}

impl SessionBroker {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        retry: RetryPolicy,
        default_adapter: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            retry,
            default_adapter: default_adapter.into(),
        }
    }

    pub fn default_adapter(&self) -> &str {
        &self.default_adapter
    }

    /// Open or resume a session.
    pub async fn open(&self, request: OpenRequest) -> BrokerResult<SessionHandle> {
        let adapter_id = request
            .adapter
            .clone()
            .unwrap_or_else(|| self.default_adapter.clone());

        if let Some(session_id) = request.resume_session_id.as_deref() {
            return self.resume(&adapter_id, &request, session_id);
        }

        let adapter = self.registry.require_chat(&adapter_id)?;
        let preference = request.encryption;
        let mut state = Negotiation::Idle.advance(preference, NegotiationEvent::Begin)?;
        let mut opened: Option<SessionOpened> = None;
        let mut last_error: Option<BrokerError> = None;
        let mut encryption_fallback: Option<BrokerError> = None;

        loop {
            tracing::debug!(
                adapter = %adapter_id,
                target = %request.target,
                state = %state,
                "Session negotiation"
            );
            match state {
                Negotiation::NegotiatingEncrypted | Negotiation::FallingBackPlaintext => {
                    let attempt = if state == Negotiation::NegotiatingEncrypted {
                        self.start_encrypted(&adapter, &request).await
                    } else {
                        self.create_plaintext(&adapter, &request).await
                    };
                    let event = match attempt {
                        Ok(session) => {
                            opened = Some(session);
                            NegotiationEvent::Succeeded
                        }
                        Err(err) => {
                            if state == Negotiation::NegotiatingEncrypted
                                && preference == EncryptionPreference::Preferred
                            {
                                tracing::warn!(
                                    adapter = %adapter_id,
                                    error = %err,
                                    "Encrypted negotiation failed, falling back to plaintext"
                                );
                                encryption_fallback = Some(err.clone());
                            }
                            last_error = Some(err);
                            NegotiationEvent::Errored
                        }
                    };
                    state = state.advance(preference, event)?;
                }
                Negotiation::Established(mode) => {
                    let session = opened.take().ok_or_else(|| {
                        BrokerError::configuration("session established without a session id")
                    })?;
                    tracing::info!(
                        adapter = %adapter_id,
                        session_id = %session.session_id,
                        mode = %mode,
                        "Session established"
                    );
                    return Ok(SessionHandle {
                        session_id: session.session_id,
                        mode,
                        target: request.target,
                        adapter,
                        retry: self.retry.clone(),
                        opened_at: Utc::now(),
                        resumed: false,
                        encryption_fallback,
                    });
                }
                Negotiation::Failed => {
                    return Err(last_error.unwrap_or_else(|| {
                        BrokerError::configuration("session negotiation failed")
                    }));
                }
                Negotiation::Idle => {
                    state = state.advance(preference, NegotiationEvent::Begin)?;
                }
            }
        }
    }

    fn resume(
        &self,
        adapter_id: &str,
        request: &OpenRequest,
        session_id: &str,
    ) -> BrokerResult<SessionHandle> {
        if request.encryption == EncryptionPreference::Required {
            return Err(BrokerError::validation(
                "resumed sessions are plaintext and cannot satisfy required encryption",
            ));
        }
        if session_id.trim().is_empty() {
            return Err(BrokerError::validation("session id to resume is empty"));
        }
        let adapter = self.registry.require_chat(adapter_id)?;
        tracing::debug!(adapter = %adapter_id, session_id, "Resuming session");
        Ok(SessionHandle {
            session_id: session_id.to_string(),
            mode: SessionMode::Plaintext,
            target: request.target.clone(),
            adapter,
            retry: self.retry.clone(),
            opened_at: Utc::now(),
            resumed: true,
            encryption_fallback: None,
        })
    }

    async fn start_encrypted(
        &self,
        adapter: &Arc<dyn ChatAdapter>,
        request: &OpenRequest,
    ) -> BrokerResult<SessionOpened> {
        if !adapter.capabilities().encryption {
            return Err(BrokerError::configuration(format!(
                "chat adapter '{}' does not support encrypted sessions",
                adapter.id()
            )));
        }
        self.retry
            .execute("chat.start_encrypted", || {
                adapter.start_encrypted(&request.target, &request.options)
            })
            .await
    }

    async fn create_plaintext(
        &self,
        adapter: &Arc<dyn ChatAdapter>,
        request: &OpenRequest,
    ) -> BrokerResult<SessionOpened> {
        self.retry
            .execute("chat.create_session", || {
                adapter.create_session(&request.target, &request.options)
            })
            .await
    }
}
