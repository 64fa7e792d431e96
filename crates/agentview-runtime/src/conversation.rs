use agentview_engine::{replay_history, TurnOutcome, TurnReducer};
use agentview_types::{HistoryRecord, Message};
use futures::Stream;
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::session::{drive_turn, ByteResult, TurnEvent};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Serving agent; names the root scope and the replayed history root
    pub agent_name: String,
    /// Buffer size for turn event channels
    pub channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            agent_name: "assistant".to_string(),
            channel_capacity: 64,
        }
    }
}

/// Owns one conversation and its single live turn.
///
/// Both mutation paths go through `&mut self`, so the reducer can never
/// run reentrantly; the `turn_active` flag additionally rejects overlap
/// when a turn future was abandoned without its cancel signal.
pub struct ConversationService {
    config: SessionConfig,
    messages: Vec<Message>,
    turn_active: bool,
}

impl ConversationService {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            messages: Vec::new(),
            turn_active: false,
        }
    }

    /// Current conversation snapshot, in display order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Event channel sized for this session's turns.
    pub fn event_channel(&self) -> (mpsc::Sender<TurnEvent>, mpsc::Receiver<TurnEvent>) {
        mpsc::channel(self.config.channel_capacity)
    }

    /// Replace the conversation wholesale with a stored one. Rejected
    /// while a live turn is consuming the conversation.
    pub fn load_history(&mut self, records: &[HistoryRecord]) -> Result<()> {
        if self.turn_active {
            return Err(Error::TurnInProgress);
        }
        self.messages = replay_history(records, &self.config.agent_name);
        Ok(())
    }

    /// Run one turn to completion: append the user message, stream the
    /// response through the reducer, and append the resulting assistant
    /// message — complete, failed, or cancelled-partial alike.
    pub async fn run_turn<S>(
        &mut self,
        user_text: impl Into<String>,
        source: S,
        events: mpsc::Sender<TurnEvent>,
        cancel: oneshot::Receiver<()>,
    ) -> Result<TurnOutcome>
    where
        S: Stream<Item = ByteResult> + Unpin,
    {
        if self.turn_active {
            return Err(Error::TurnInProgress);
        }
        self.turn_active = true;

        self.messages.push(Message::user(user_text));

        let reducer = TurnReducer::new(self.config.agent_name.as_str());
        let (message, outcome) = drive_turn(source, reducer, events, cancel).await;
        self.messages.push(message);

        self.turn_active = false;
        Ok(outcome)
    }
}
