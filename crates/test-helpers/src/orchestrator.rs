//! Broadcaster and orchestrator doubles.

use crate::storage::{MemoryObjectStore, StubTranscoder};
use async_trait::async_trait;
use parking_lot::Mutex;
use probpay_core::{
    Broadcaster, ObjectStore, Orchestrator, SettlementError, TicketError, Transcoder,
};
use probpay_messages::Payment;
use probpay_types::{
    verify_sig, Address, BlockNumber, KeyPair, ManifestId, PriceInfo, Rendition, Segment,
    Signature, TicketParams, VideoProfile,
};

/// A [`Broadcaster`] backed by a real key.
pub struct StubBroadcaster {
    key: KeyPair,
}

impl StubBroadcaster {
    pub fn new(key: KeyPair) -> Self {
        Self { key }
    }
}

impl Broadcaster for StubBroadcaster {
    fn address(&self) -> Address {
        self.key.address()
    }

    fn sign(&self, message: &[u8]) -> Signature {
        self.key.sign(message)
    }
}

/// A recorded `debit_fees` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debit {
    pub sender: Option<Address>,
    pub manifest_id: ManifestId,
    pub price: Option<PriceInfo>,
    pub pixels: i64,
}

struct State {
    block: BlockNumber,
    capacity_error: Option<String>,
    payment_error: Option<TicketError>,
    sufficient_balance: bool,
    ticket_params: Option<TicketParams>,
    ticket_params_error: Option<String>,
    price: Option<PriceInfo>,
    price_error: Option<String>,
    payments: Vec<(Payment, ManifestId)>,
    debits: Vec<Debit>,
}

/// An [`Orchestrator`] whose every decision is scripted.
pub struct StubOrchestrator {
    key: KeyPair,
    service_uri: String,
    transcoder: StubTranscoder,
    store: MemoryObjectStore,
    state: Mutex<State>,
}

impl StubOrchestrator {
    pub fn new(key: KeyPair) -> Self {
        Self {
            key,
            service_uri: "https://127.0.0.1:8935".to_string(),
            transcoder: StubTranscoder::new(0),
            store: MemoryObjectStore::new(),
            state: Mutex::new(State {
                block: BlockNumber(1),
                capacity_error: None,
                payment_error: None,
                sufficient_balance: true,
                ticket_params: None,
                ticket_params_error: None,
                price: None,
                price_error: None,
                payments: Vec::new(),
                debits: Vec::new(),
            }),
        }
    }

    pub fn with_service_uri(mut self, uri: impl Into<String>) -> Self {
        self.service_uri = uri.into();
        self
    }

    pub fn with_transcoder(mut self, transcoder: StubTranscoder) -> Self {
        self.transcoder = transcoder;
        self
    }

    pub fn with_store(mut self, store: MemoryObjectStore) -> Self {
        self.store = store;
        self
    }

    pub fn with_capacity_error(self, message: impl Into<String>) -> Self {
        self.state.lock().capacity_error = Some(message.into());
        self
    }

    pub fn with_payment_error(self, err: TicketError) -> Self {
        self.state.lock().payment_error = Some(err);
        self
    }

    pub fn with_insufficient_balance(self) -> Self {
        self.state.lock().sufficient_balance = false;
        self
    }

    pub fn with_ticket_params(self, params: TicketParams) -> Self {
        self.state.lock().ticket_params = Some(params);
        self
    }

    pub fn with_ticket_params_error(self, message: impl Into<String>) -> Self {
        self.state.lock().ticket_params_error = Some(message.into());
        self
    }

    pub fn with_price(self, price: PriceInfo) -> Self {
        self.state.lock().price = Some(price);
        self
    }

    pub fn with_price_error(self, message: impl Into<String>) -> Self {
        self.state.lock().price_error = Some(message.into());
        self
    }

    pub fn key(&self) -> &KeyPair {
        &self.key
    }

    pub fn store(&self) -> &MemoryObjectStore {
        &self.store
    }

    pub fn payments(&self) -> Vec<(Payment, ManifestId)> {
        self.state.lock().payments.clone()
    }

    pub fn debits(&self) -> Vec<Debit> {
        self.state.lock().debits.clone()
    }
}

#[async_trait]
impl Orchestrator for StubOrchestrator {
    fn address(&self) -> Address {
        self.key.address()
    }

    fn service_uri(&self) -> String {
        self.service_uri.clone()
    }

    fn sign(&self, message: &[u8]) -> Signature {
        self.key.sign(message)
    }

    fn verify_sig(&self, address: &Address, message: &[u8], sig: &Signature) -> bool {
        verify_sig(address, message, sig)
    }

    fn current_block(&self) -> BlockNumber {
        self.state.lock().block
    }

    fn check_capacity(&self, _manifest_id: &ManifestId) -> Result<(), SettlementError> {
        match &self.state.lock().capacity_error {
            Some(message) => Err(SettlementError::Capacity(message.clone())),
            None => Ok(()),
        }
    }

    fn process_payment(
        &self,
        payment: &Payment,
        manifest_id: &ManifestId,
    ) -> Result<(), SettlementError> {
        let mut state = self.state.lock();
        state.payments.push((payment.clone(), manifest_id.clone()));
        match &state.payment_error {
            Some(err) => Err(err.clone().into()),
            None => Ok(()),
        }
    }

    fn sufficient_balance(&self, _sender: Option<&Address>, _manifest_id: &ManifestId) -> bool {
        self.state.lock().sufficient_balance
    }

    fn debit_fees(
        &self,
        sender: Option<&Address>,
        manifest_id: &ManifestId,
        price: Option<&PriceInfo>,
        pixels: i64,
    ) {
        self.state.lock().debits.push(Debit {
            sender: sender.copied(),
            manifest_id: manifest_id.clone(),
            price: price.copied(),
            pixels,
        });
    }

    fn ticket_params(&self, _sender: &Address) -> Result<Option<TicketParams>, SettlementError> {
        let state = self.state.lock();
        match &state.ticket_params_error {
            Some(message) => Err(SettlementError::Internal(message.clone())),
            None => Ok(state.ticket_params.clone()),
        }
    }

    fn price_info(&self, _sender: &Address) -> Result<Option<PriceInfo>, SettlementError> {
        let state = self.state.lock();
        match &state.price_error {
            Some(message) => Err(SettlementError::Internal(message.clone())),
            None => Ok(state.price),
        }
    }

    async fn transcode_seg(
        &self,
        manifest_id: &ManifestId,
        segment: &Segment,
        profiles: &[VideoProfile],
    ) -> Result<Vec<Rendition>, SettlementError> {
        self.transcoder.transcode(manifest_id, segment, profiles).await
    }

    async fn save_rendition(
        &self,
        manifest_id: &ManifestId,
        seq_no: u64,
        rendition: &Rendition,
    ) -> Result<String, SettlementError> {
        let path = format!("{}/{}/{}.ts", manifest_id, rendition.profile.name, seq_no);
        self.store.save(&path, rendition.data.clone()).await
    }
}
