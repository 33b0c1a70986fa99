use chat_summary_model::{Host, InputKind, InputOutcome, InputRequest};

/// Asks the host for a value through a modal input.
///
/// This suspends until the user answers. Cancellation is an ordinary
/// outcome and is logged at debug level only.
pub async fn ask(host: &dyn Host, kind: InputKind, initial: &str) -> InputOutcome {
    let (request, pending) = InputRequest::new(kind, initial);
    host.request_input(request);
    let outcome = pending.outcome().await;
    if let InputOutcome::Cancelled(reason) = &outcome {
        debug!("{kind:?} input cancelled: {reason:?}");
    }
    outcome
}
