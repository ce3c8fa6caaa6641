#![deny(unsafe_code)]

//! Client-side session state for the agent chat: transcript, streamed progress steps
//! and the seams to the push channel and the agent service.

use std::future::Future;
use std::pin::Pin;

/// Push-channel seam and scoped subscriptions.
pub mod channel;
pub mod error;
/// Platform event payloads and status classification.
pub mod event;
pub mod ids;
pub mod local;
/// Transcript entities.
pub mod message;
/// Agent service seam.
pub mod service;
pub mod view_model;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use channel::{
    ErrorListener, EventChannel, ReplayFrom, Subscription, mount_agent_steps,
    mount_channel,
};
pub use error::{
    ChannelError, ChannelResult, ServiceError, ServiceResult, SessionError, SessionResult,
    UNKNOWN_ERROR_MESSAGE,
};
pub use event::{AGENT_STEP_CHANNEL, AgentStepPayload, ChannelMessage, StepStatus};
pub use ids::{MessageId, SessionId, StepId};
pub use local::LocalChannel;
pub use message::{HistoryEntry, Message, MessageTone, Role, Step};
pub use service::{AgentService, StartRequest, request_stop};
pub use view_model::{
    EventDisposition, Key, KeyOutcome, KeyPress, SessionViewModel, TurnState,
    UNKNOWN_AGENT_ERROR,
};
