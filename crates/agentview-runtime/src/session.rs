use agentview_engine::{TurnOutcome, TurnReducer};
use agentview_protocol::FrameDecoder;
use agentview_types::{FaultPayload, Message, StreamFrame};
use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// One chunk of transport bytes, at whatever boundary the transport
/// happened to deliver.
pub type ByteResult = std::io::Result<Vec<u8>>;

/// Progress events emitted while a turn streams. Every variant carries a
/// cloned snapshot of the assistant message, so consumers never observe
/// a half-applied frame.
#[derive(Debug, Clone)]
pub enum TurnEvent {
    /// One more frame was applied
    Update(Message),
    /// Server sent the done frame
    Completed(Message),
    /// Server error frame or transport failure ended the turn
    Failed(Message),
    /// The cancel signal stopped the turn; pending calls stay pending
    Cancelled(Message),
}

/// Drive one turn: read chunks, decode frames, fold them into the
/// reducer in strict arrival order, and report progress over `events`.
///
/// The loop suspends only while awaiting the next chunk; per-frame work
/// is synchronous. Firing `cancel` stops further reads immediately —
/// the turn ends in a partially-populated state with no done marker.
/// Dropping the cancel handle without firing it does not cancel.
pub async fn drive_turn<S>(
    mut source: S,
    mut reducer: TurnReducer,
    events: mpsc::Sender<TurnEvent>,
    cancel: oneshot::Receiver<()>,
) -> (Message, TurnOutcome)
where
    S: Stream<Item = ByteResult> + Unpin,
{
    let mut decoder = FrameDecoder::new();

    let cancel_signal = async move {
        if cancel.await.is_err() {
            // Handle dropped without firing: never resolve
            futures::future::pending::<()>().await;
        }
    };
    tokio::pin!(cancel_signal);

    loop {
        let chunk = tokio::select! {
            biased;
            _ = &mut cancel_signal => {
                debug!("turn cancelled; stopping reads");
                let (message, outcome) = reducer.finish();
                let _ = events.send(TurnEvent::Cancelled(message.clone())).await;
                return (message, outcome);
            }
            chunk = source.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                for frame in decoder.push(&bytes) {
                    reducer.apply(frame);
                    let _ = events.send(TurnEvent::Update(reducer.snapshot())).await;
                    if reducer.is_finished() {
                        return finalize(reducer, &events).await;
                    }
                }
            }

            Some(Err(err)) => {
                // Transport failure: surfaced as a single explanatory
                // text item, turn marked failed, partial state kept
                reducer.apply(StreamFrame::Fault(FaultPayload {
                    message: format!("connection lost: {}", err),
                }));
                return finalize(reducer, &events).await;
            }

            None => {
                // End of stream: a trailing unterminated line may still
                // hold the terminal frame
                if let Some(frame) = decoder.finish() {
                    reducer.apply(frame);
                    let _ = events.send(TurnEvent::Update(reducer.snapshot())).await;
                }
                if !reducer.is_finished() {
                    reducer.apply(StreamFrame::Fault(FaultPayload {
                        message: "stream ended unexpectedly".to_string(),
                    }));
                }
                return finalize(reducer, &events).await;
            }
        }
    }
}

async fn finalize(
    reducer: TurnReducer,
    events: &mpsc::Sender<TurnEvent>,
) -> (Message, TurnOutcome) {
    let (message, outcome) = reducer.finish();
    let event = match outcome {
        TurnOutcome::Completed => TurnEvent::Completed(message.clone()),
        TurnOutcome::Failed => TurnEvent::Failed(message.clone()),
        TurnOutcome::Cancelled => TurnEvent::Cancelled(message.clone()),
    };
    let _ = events.send(event).await;
    (message, outcome)
}
