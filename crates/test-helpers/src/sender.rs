//! Scriptable ticket sender.

use parking_lot::Mutex;
use probpay_core::{SenderError, TicketSender};
use probpay_types::{
    BigRational, KeyPair, SessionId, TicketBatch, TicketParams, TicketSenderParams,
};
use std::collections::HashMap;

struct State {
    ev: Result<BigRational, SenderError>,
    batch_error: Option<SenderError>,
    sessions: HashMap<SessionId, TicketParams>,
    batch_calls: Vec<(SessionId, usize)>,
    next_nonce: u32,
}

/// A [`TicketSender`] that signs real tickets with its own key but lets
/// tests script the expected value and batch failures.
pub struct MockSender {
    key: KeyPair,
    state: Mutex<State>,
}

impl MockSender {
    pub fn new(key: KeyPair, ev: BigRational) -> Self {
        Self {
            key,
            state: Mutex::new(State {
                ev: Ok(ev),
                batch_error: None,
                sessions: HashMap::new(),
                batch_calls: Vec::new(),
                next_nonce: 0,
            }),
        }
    }

    pub fn with_ev_error(self, err: SenderError) -> Self {
        self.state.lock().ev = Err(err);
        self
    }

    pub fn with_batch_error(self, err: SenderError) -> Self {
        self.state.lock().batch_error = Some(err);
        self
    }

    pub fn key(&self) -> &KeyPair {
        &self.key
    }

    /// `(session, size)` of every `create_ticket_batch` call.
    pub fn batch_calls(&self) -> Vec<(SessionId, usize)> {
        self.state.lock().batch_calls.clone()
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().sessions.len()
    }
}

impl TicketSender for MockSender {
    fn start_session(&self, params: TicketParams) -> SessionId {
        let id = SessionId(params.recipient_rand_hash.to_hex());
        self.state.lock().sessions.insert(id.clone(), params);
        id
    }

    fn ev(&self, _session: &SessionId) -> Result<BigRational, SenderError> {
        self.state.lock().ev.clone()
    }

    fn create_ticket_batch(
        &self,
        session: &SessionId,
        size: usize,
    ) -> Result<TicketBatch, SenderError> {
        let mut state = self.state.lock();
        state.batch_calls.push((session.clone(), size));
        if let Some(err) = &state.batch_error {
            return Err(err.clone());
        }
        let params = state
            .sessions
            .get(session)
            .cloned()
            .ok_or_else(|| SenderError::UnknownSession(session.clone()))?;

        let sender = self.key.address();
        let mut sender_params = Vec::with_capacity(size);
        for _ in 0..size {
            let nonce = state.next_nonce;
            state.next_nonce += 1;
            let ticket = params.ticket(sender, nonce);
            sender_params.push(TicketSenderParams {
                sender_nonce: nonce,
                sig: self.key.sign(ticket.hash().as_bytes()),
            });
        }

        Ok(TicketBatch {
            params,
            sender,
            sender_params,
        })
    }
}
