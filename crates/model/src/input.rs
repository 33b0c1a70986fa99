use tokio::sync::oneshot;

/// The value a modal input asks the user for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputKind {
    /// The name of a conversation to create. Must not be blank.
    ChatName,
    /// The global summary template. May be empty.
    Template,
}

/// Why the user dismissed a modal input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CancelReason {
    /// The close button was clicked.
    Closed,
    /// The user clicked outside the modal.
    ClickedOutside,
    /// The Escape key was pressed.
    Escape,
    /// The request was dropped without an answer.
    Dismissed,
}

/// The result of a modal input.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum InputOutcome {
    /// The user confirmed a value.
    Confirmed(String),
    /// The user dismissed the modal.
    Cancelled(CancelReason),
}

/// A request for the host to show a modal input and collect a value.
///
/// The host must either [`confirm`](Self::confirm) or
/// [`cancel`](Self::cancel) the request. Dropping it counts as a
/// cancellation with [`CancelReason::Dismissed`].
#[derive(Debug)]
pub struct InputRequest {
    kind: InputKind,
    initial: String,
    result_tx: Option<oneshot::Sender<InputOutcome>>,
}

impl InputRequest {
    /// Creates a request together with the handle that awaits its answer.
    #[inline]
    pub fn new<S: Into<String>>(
        kind: InputKind,
        initial: S,
    ) -> (Self, PendingInput) {
        let (result_tx, result_rx) = oneshot::channel();
        let request = Self {
            kind,
            initial: initial.into(),
            result_tx: Some(result_tx),
        };
        (request, PendingInput(result_rx))
    }

    /// Returns what the request asks for.
    #[inline]
    pub fn kind(&self) -> InputKind {
        self.kind
    }

    /// Returns the value the input should be pre-filled with.
    #[inline]
    pub fn initial(&self) -> &str {
        &self.initial
    }

    /// Confirms the request with a value.
    ///
    /// Conversation names are trimmed. A blank name is refused and the
    /// request is handed back, so the modal can stay open.
    pub fn confirm<S: Into<String>>(mut self, value: S) -> Result<(), Self> {
        let mut value = value.into();
        if self.kind == InputKind::ChatName {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(self);
            }
            value = trimmed.to_owned();
        }
        self.finish(InputOutcome::Confirmed(value));
        Ok(())
    }

    /// Cancels the request.
    #[inline]
    pub fn cancel(mut self, reason: CancelReason) {
        self.finish(InputOutcome::Cancelled(reason));
    }

    fn finish(&mut self, outcome: InputOutcome) {
        if let Some(result_tx) = self.result_tx.take() {
            result_tx.send(outcome).ok();
        }
    }
}

/// The awaiting side of an [`InputRequest`].
#[derive(Debug)]
pub struct PendingInput(oneshot::Receiver<InputOutcome>);

impl PendingInput {
    /// Waits until the user answers or dismisses the modal.
    pub async fn outcome(self) -> InputOutcome {
        self.0
            .await
            .unwrap_or(InputOutcome::Cancelled(CancelReason::Dismissed))
    }
}
