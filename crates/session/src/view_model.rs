use crate::error::{ServiceError, ServiceResult};
use crate::event::{AgentStepPayload, ChannelMessage, StepStatus};
use crate::ids::{MessageId, SessionId, StepId};
use crate::message::{HistoryEntry, Message, Role, Step};
use crate::service::StartRequest;

/// Content of an error-toned turn when the agent supplies no answer.
pub const UNKNOWN_AGENT_ERROR: &str = "An unknown error occurred";

/// Lifecycle of one conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TurnState {
    #[default]
    Idle,
    /// Start call issued, completion not yet observed.
    Sending,
    /// Start call succeeded; waiting for progress and a terminal event.
    Streaming,
}

/// Keys the view-model reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub shift: bool,
}

impl KeyPress {
    pub const fn new(key: Key, shift: bool) -> Self {
        Self { key, shift }
    }

    pub const fn enter() -> Self {
        Self::new(Key::Enter, false)
    }

    pub const fn shift_enter() -> Self {
        Self::new(Key::Enter, true)
    }

    /// Enter without Shift submits; Shift+Enter keeps its newline.
    pub const fn submits(&self) -> bool {
        matches!(self.key, Key::Enter) && !self.shift
    }
}

/// Result of routing a key press through the view-model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Host applies its default behavior, e.g. inserting a newline.
    PassThrough,
    /// Default suppressed. Carries the start call to issue when the send was accepted.
    Submitted(Option<StartRequest>),
}

/// What an inbound event did to the view-model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDisposition {
    /// Tagged with a different (or no) session.
    ForeignSession,
    /// No turn is in flight for this session.
    NoActiveTurn,
    /// An in-progress event with neither utterance nor thought.
    EmptyStep,
    StepBuffered(StepId),
    Completed(MessageId),
    Failed(MessageId),
}

/// Client-side session state: transcript, pending step buffer, conversation history
/// and the single in-flight turn.
///
/// The view-model never performs I/O. [`send`](Self::send) hands back the start call
/// for the host to execute, and the host reports completion through
/// [`complete_start`](Self::complete_start). All methods are expected to run on one
/// logical thread.
#[derive(Debug, Clone, Default)]
pub struct SessionViewModel {
    messages: Vec<Message>,
    pending_steps: Vec<Step>,
    history: Vec<HistoryEntry>,
    input: String,
    session_id: Option<SessionId>,
    turn: TurnState,
    next_local_id: u64,
    scroll_pending: bool,
    revision: u64,
}

impl SessionViewModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn pending_steps(&self) -> &[Step] {
        &self.pending_steps
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn turn(&self) -> TurnState {
        self.turn
    }

    pub fn is_loading(&self) -> bool {
        self.turn != TurnState::Idle
    }

    /// Monotonic counter bumped on every observable mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Consumes the pending scroll-to-bottom request. Hosts call this once their next
    /// layout pass has completed.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_pending)
    }

    pub fn set_input(&mut self, value: impl Into<String>) {
        let value = value.into();
        if self.input != value {
            self.input = value;
            self.touch();
        }
    }

    pub fn key_down(&mut self, key: KeyPress) -> KeyOutcome {
        if !key.submits() {
            return KeyOutcome::PassThrough;
        }
        KeyOutcome::Submitted(self.send())
    }

    /// Sends the trimmed input as a new turn.
    ///
    /// Returns `None` when the input is blank, a turn is already in flight, or the
    /// session id could not be generated. The last case is surfaced in the transcript
    /// like a failed start call.
    pub fn send(&mut self) -> Option<StartRequest> {
        let content = self.input.trim().to_string();
        if content.is_empty() || self.is_loading() {
            return None;
        }

        let message_id = self.alloc_message_id();
        self.messages.push(Message::user(message_id, content.clone()));
        self.history
            .push(HistoryEntry::new(Role::User, content.clone()));
        self.input.clear();
        self.turn = TurnState::Sending;
        self.pending_steps.clear();
        self.request_scroll();
        self.touch();

        let session_id = match self.ensure_session_id() {
            Ok(session_id) => session_id,
            Err(error) => {
                self.complete_start(Err(error));
                return None;
            }
        };

        tracing::debug!(
            session_id = %session_id,
            history_len = self.history.len(),
            "starting agent turn"
        );

        Some(StartRequest {
            session_id,
            user_message: content,
            history: self.history.clone(),
        })
    }

    /// Applies the outcome of the start call issued for the current turn.
    pub fn complete_start(&mut self, outcome: ServiceResult<()>) {
        match outcome {
            Ok(()) => {
                // A terminal event may already have closed the turn.
                if self.turn == TurnState::Sending {
                    self.turn = TurnState::Streaming;
                    self.touch();
                }
            }
            // Reported even when a terminal event already closed the turn.
            Err(error) => {
                tracing::error!(error = %error, "agent start failed");
                let message_id = self.alloc_message_id();
                self.messages.push(Message::assistant_error(
                    message_id,
                    format!("Error: {}", error.diagnostic()),
                    Vec::new(),
                ));
                self.pending_steps.clear();
                self.turn = TurnState::Idle;
                self.request_scroll();
                self.touch();
            }
        }
    }

    /// Session id to pass to the agent service stop call, if a session exists. Local
    /// state is untouched; the run's terminal event closes the turn.
    pub fn stop_target(&self) -> Option<SessionId> {
        self.session_id.clone()
    }

    pub fn handle_channel_message(&mut self, message: &ChannelMessage) -> EventDisposition {
        self.handle_event(message.payload())
    }

    pub fn handle_event(&mut self, payload: &AgentStepPayload) -> EventDisposition {
        let is_current = self
            .session_id
            .as_ref()
            .is_some_and(|session_id| session_id.matches(payload.session_id.as_deref()));
        if !is_current {
            return EventDisposition::ForeignSession;
        }

        if !self.is_loading() {
            tracing::debug!(status = payload.status.as_str(), "dropping event with no turn in flight");
            return EventDisposition::NoActiveTurn;
        }

        match payload.status {
            StepStatus::InProgress => self.buffer_step(payload),
            StepStatus::Error => self.finish_with_error(payload),
            StepStatus::Final => self.finish_with_answer(payload),
        }
    }

    /// Flips the thought disclosure of `step_id` wherever that step currently lives.
    /// Returns whether any step matched.
    pub fn toggle_thought(&mut self, step_id: StepId) -> bool {
        let mut matched = false;
        for step in &mut self.pending_steps {
            matched |= step.toggle_if(step_id);
        }
        for message in &mut self.messages {
            for step in &mut message.steps {
                matched |= step.toggle_if(step_id);
            }
        }

        if matched {
            self.touch();
        }
        matched
    }

    fn buffer_step(&mut self, payload: &AgentStepPayload) -> EventDisposition {
        // Empty steps must not consume a local id.
        let step_id = StepId::new(self.next_local_id.saturating_add(1));
        let Some(step) = Step::from_parts(
            step_id,
            payload.utterance.as_deref(),
            payload.thought.as_deref(),
        ) else {
            return EventDisposition::EmptyStep;
        };
        self.alloc_local_id();

        self.pending_steps.push(step);
        self.request_scroll();
        self.touch();
        EventDisposition::StepBuffered(step_id)
    }

    fn finish_with_error(&mut self, payload: &AgentStepPayload) -> EventDisposition {
        let content = payload
            .answer
            .as_deref()
            .filter(|answer| !answer.is_empty())
            .unwrap_or(UNKNOWN_AGENT_ERROR)
            .to_string();
        let message_id = self.alloc_message_id();
        let steps = std::mem::take(&mut self.pending_steps);

        tracing::warn!(step_count = steps.len(), "agent turn failed");
        // Failed turns stay out of the history sent as context.
        self.messages
            .push(Message::assistant_error(message_id, content, steps));
        self.turn = TurnState::Idle;
        self.request_scroll();
        self.touch();
        EventDisposition::Failed(message_id)
    }

    fn finish_with_answer(&mut self, payload: &AgentStepPayload) -> EventDisposition {
        let content = payload.answer.clone().unwrap_or_default();
        let message_id = self.alloc_message_id();
        let steps = std::mem::take(&mut self.pending_steps);

        tracing::debug!(step_count = steps.len(), "agent turn completed");
        self.messages
            .push(Message::assistant(message_id, content.clone(), steps));
        self.history
            .push(HistoryEntry::new(Role::Assistant, content));
        self.turn = TurnState::Idle;
        self.request_scroll();
        self.touch();
        EventDisposition::Completed(message_id)
    }

    fn ensure_session_id(&mut self) -> ServiceResult<SessionId> {
        if let Some(session_id) = &self.session_id {
            return Ok(session_id.clone());
        }

        let session_id = SessionId::generate().map_err(ServiceError::from)?;
        tracing::info!(session_id = %session_id, "created agent session");
        self.session_id = Some(session_id.clone());
        Ok(session_id)
    }

    fn alloc_local_id(&mut self) -> u64 {
        self.next_local_id = self.next_local_id.saturating_add(1);
        self.next_local_id
    }

    fn alloc_message_id(&mut self) -> MessageId {
        MessageId::new(self.alloc_local_id())
    }

    fn request_scroll(&mut self) {
        self.scroll_pending = true;
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}
