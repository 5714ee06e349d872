//! Delivery of match events to participants.
//!
//! At-most-once: each transition is offered to a participant exactly one
//! time through a non-blocking send. Failures are returned, never retried,
//! and the match decides what a failure means.

use crate::connection::SendFailure;
use crate::error::TransportError;
use crate::game_match::{Participant, Slot};
use crate::protocol::{MatchSnapshot, ResultTag, ServerMessage};
use tracing::{debug, instrument, warn};

/// Sends one message to one participant.
#[instrument(skip(participant, message), fields(symbol = %participant.symbol()))]
pub fn send_to(participant: &Participant, message: ServerMessage) -> Result<(), TransportError> {
    participant
        .handle()
        .send(message)
        .map_err(|failure| transport_error(participant, failure))
}

/// Sends `message` to every occupied slot.
///
/// Returns the failures; an empty vector means everyone was reached.
#[instrument(skip_all)]
pub fn broadcast(slots: &[Slot; 2], message: &ServerMessage) -> Vec<TransportError> {
    let failures: Vec<_> = slots
        .iter()
        .filter_map(Slot::participant)
        .filter_map(|participant| send_to(participant, message.clone()).err())
        .collect();
    if !failures.is_empty() {
        warn!(?failures, "Broadcast partially failed");
    }
    failures
}

/// Delivers a final result and closes the participant's connection.
///
/// Best effort: the close is requested even when the result message could
/// not be queued.
#[instrument(skip(participant, snapshot), fields(symbol = %participant.symbol()))]
pub fn conclude(
    participant: &Participant,
    result: ResultTag,
    snapshot: Option<MatchSnapshot>,
) -> Result<(), TransportError> {
    let sent = send_to(participant, ServerMessage::GameOver { result, snapshot });
    let closed = participant
        .handle()
        .close(result)
        .map_err(|failure| transport_error(participant, failure));
    match sent.and(closed) {
        Ok(()) => {
            debug!(%result, "Participant concluded");
            Ok(())
        }
        Err(err) => {
            debug!(%result, error = %err, "Participant unreachable at conclusion");
            Err(err)
        }
    }
}

fn transport_error(participant: &Participant, failure: SendFailure) -> TransportError {
    match failure {
        SendFailure::Closed => TransportError::Disconnected(participant.symbol()),
        SendFailure::Full => TransportError::Backpressure(participant.symbol()),
    }
}
