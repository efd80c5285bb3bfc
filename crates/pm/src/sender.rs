//! Ticket issuance on the paying side.

use dashmap::DashMap;
use parking_lot::Mutex;
use probpay_core::{SenderError, TicketSender};
use probpay_types::{
    BigRational, KeyPair, SessionId, TicketBatch, TicketParams, TicketSenderParams,
};
use std::sync::Arc;
use tracing::debug;

struct Session {
    params: TicketParams,
    next_nonce: u32,
}

/// Signs tickets against recipient-issued params.
///
/// Sessions are keyed by the params' rand hash. Nonces within a session are
/// consecutive and never reused.
pub struct Sender {
    key: KeyPair,
    sessions: DashMap<SessionId, Arc<Mutex<Session>>>,
}

impl Sender {
    pub fn new(key: KeyPair) -> Self {
        Self {
            key,
            sessions: DashMap::new(),
        }
    }

    pub fn key(&self) -> &KeyPair {
        &self.key
    }

    /// Forget a session. Returns whether it existed.
    pub fn end_session(&self, session: &SessionId) -> bool {
        self.sessions.remove(session).is_some()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn session(&self, id: &SessionId) -> Result<Arc<Mutex<Session>>, SenderError> {
        self.sessions
            .get(id)
            .map(|s| s.clone())
            .ok_or_else(|| SenderError::UnknownSession(id.clone()))
    }
}

impl TicketSender for Sender {
    fn start_session(&self, params: TicketParams) -> SessionId {
        let id = SessionId(params.recipient_rand_hash.to_hex());
        debug!(
            session = %id,
            recipient = %params.recipient,
            expiration_block = params.expiration_block.0,
            "Started ticket session"
        );
        // Params with the same rand hash are the same session; keep its nonce.
        self.sessions
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Session { params, next_nonce: 0 })));
        id
    }

    fn ev(&self, session: &SessionId) -> Result<BigRational, SenderError> {
        Ok(self.session(session)?.lock().params.ev())
    }

    fn create_ticket_batch(
        &self,
        session: &SessionId,
        size: usize,
    ) -> Result<TicketBatch, SenderError> {
        let session_ref = self.session(session)?;
        let mut state = session_ref.lock();

        let first = state.next_nonce;
        let next = u32::try_from(size)
            .ok()
            .and_then(|n| first.checked_add(n))
            .ok_or_else(|| SenderError::Signer("sender nonce overflow".into()))?;

        let sender = self.key.address();
        let sender_params = (first..next)
            .map(|nonce| {
                let ticket = state.params.ticket(sender, nonce);
                TicketSenderParams {
                    sender_nonce: nonce,
                    sig: self.key.sign(ticket.hash().as_bytes()),
                }
            })
            .collect();
        state.next_nonce = next;

        debug!(session = %session, size, first_nonce = first, "Created ticket batch");

        Ok(TicketBatch {
            params: state.params.clone(),
            sender,
            sender_params,
        })
    }
}
