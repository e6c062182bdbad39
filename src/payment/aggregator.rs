/// Payment status aggregation over the external SDK.
use crate::config::ConfigManager;
use crate::payment::status::{
    AggregatedPaymentStatus, CallbackSlot, DetailsState, PaymentState, drop_consumed,
};
use crate::payment::{
    InputDetail, PaymentDataCallback, PaymentDetails, PaymentDetailsCallback, PaymentError,
    PaymentMethod, PaymentMethodCallback, PaymentRequestDetailsListener, PaymentRequestHandle,
    PaymentRequestListener, PaymentRequestResult, PaymentSdk, PaymentSession, PaymentType,
    UriCallback,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

struct SessionState {
    session: Option<Arc<dyn PaymentSession>>,
    session_id: Option<Uuid>,
    // bumped on every new or cancelled session, listeners of older generations are ignored
    generation: u64,
    version: u64,
    payment: PaymentState,
    details: DetailsState,
}

impl SessionState {
    fn reset(&mut self, session_id: Option<Uuid>) {
        self.generation += 1;
        self.session_id = session_id;
        self.payment = PaymentState::default();
        self.details = DetailsState::default();
    }
}

/// Latest-value cell written by SDK listeners and read by the aggregator.
struct StatusSink {
    state: Mutex<SessionState>,
    status: watch::Sender<AggregatedPaymentStatus>,
}

impl StatusSink {
    fn new() -> Self {
        let (status, _) = watch::channel(AggregatedPaymentStatus::default());
        Self {
            state: Mutex::new(SessionState {
                session: None,
                session_id: None,
                generation: 0,
                version: 0,
                payment: PaymentState::default(),
                details: DetailsState::default(),
            }),
            status,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes the merged snapshot. Called with the state lock held so
    /// concurrent listener calls cannot interleave their publishes.
    fn publish(&self, state: &mut SessionState) {
        state.version += 1;
        self.status.send_replace(AggregatedPaymentStatus::from(
            state.session_id,
            state.version,
            &state.payment,
            &state.details,
        ));
    }

    fn update_payment<F>(&self, generation: u64, event: &'static str, apply: F)
    where
        F: FnOnce(&mut PaymentState),
    {
        let mut state = self.lock();
        if state.generation != generation {
            warn!(event, "ignoring callback from a stale payment session");
            return;
        }
        apply(&mut state.payment);
        self.publish(&mut state);
    }

    fn update_details<F>(&self, generation: u64, event: &'static str, apply: F)
    where
        F: FnOnce(&mut DetailsState),
    {
        let mut state = self.lock();
        if state.generation != generation {
            warn!(event, "ignoring callback from a stale payment session");
            return;
        }
        apply(&mut state.details);
        self.publish(&mut state);
    }

    fn clear_consumed_callbacks(&self) {
        let mut state = self.lock();
        let state = &mut *state;
        if drop_consumed(&mut state.payment, &mut state.details) {
            self.publish(state);
        }
    }
}

/// Listener-side reference to the sink. Weak, since the session the SDK hands
/// back owns the listeners and the sink owns that session.
struct SinkHandle {
    sink: Weak<StatusSink>,
    generation: u64,
}

impl SinkHandle {
    fn new(sink: &Arc<StatusSink>, generation: u64) -> Self {
        Self {
            sink: Arc::downgrade(sink),
            generation,
        }
    }

    fn update_payment<F>(&self, event: &'static str, apply: F)
    where
        F: FnOnce(&mut PaymentState),
    {
        match self.sink.upgrade() {
            Some(sink) => sink.update_payment(self.generation, event, apply),
            None => debug!(event, "aggregator dropped, ignoring callback"),
        }
    }

    fn update_details<F>(&self, event: &'static str, apply: F)
    where
        F: FnOnce(&mut DetailsState),
    {
        match self.sink.upgrade() {
            Some(sink) => sink.update_details(self.generation, event, apply),
            None => debug!(event, "aggregator dropped, ignoring callback"),
        }
    }
}

/// Payment lifecycle listener handed to the SDK.
struct PaymentStatusListener {
    sink: SinkHandle,
}

impl PaymentRequestListener for PaymentStatusListener {
    fn on_payment_data_requested(
        &self,
        _request: PaymentRequestHandle,
        token: String,
        callback: Box<dyn PaymentDataCallback>,
    ) {
        debug!(generation = self.sink.generation, "payment data requested");
        self.sink
            .update_payment("payment_data_requested", |payment| {
                payment.token = Some(token);
                payment.data_callback = Some(CallbackSlot::new(callback));
            });
    }

    fn on_payment_result(&self, _request: PaymentRequestHandle, result: PaymentRequestResult) {
        debug!(
            generation = self.sink.generation,
            processed = result.is_processed(),
            "payment result received"
        );
        self.sink
            .update_payment("payment_result", |payment| {
                payment.result = Some(result);
            });
    }
}

/// Details lifecycle listener handed to the SDK.
struct DetailsStatusListener {
    sink: SinkHandle,
}

impl PaymentRequestDetailsListener for DetailsStatusListener {
    fn on_payment_method_selection_required(
        &self,
        _request: PaymentRequestHandle,
        recurring_methods: Vec<PaymentMethod>,
        other_methods: Vec<PaymentMethod>,
        callback: Box<dyn PaymentMethodCallback>,
    ) {
        debug!(
            generation = self.sink.generation,
            recurring = recurring_methods.len(),
            available = other_methods.len(),
            "payment method selection required"
        );
        self.sink
            .update_details("payment_method_selection_required", |details| {
                details.service_callback = Some(CallbackSlot::new(callback));
                details.recurring_services = recurring_methods;
                details.available_services = other_methods;
            });
    }

    fn on_redirect_required(
        &self,
        _request: PaymentRequestHandle,
        redirect_url: String,
        callback: Box<dyn UriCallback>,
    ) {
        debug!(generation = self.sink.generation, %redirect_url, "redirect required");
        self.sink
            .update_details("redirect_required", |details| {
                details.uri_callback = Some(CallbackSlot::new(callback));
                details.redirect_url = Some(redirect_url);
            });
    }

    fn on_payment_details_required(
        &self,
        request: PaymentRequestHandle,
        input_details: Vec<InputDetail>,
        callback: Box<dyn PaymentDetailsCallback>,
    ) {
        debug!(
            generation = self.sink.generation,
            inputs = input_details.len(),
            "payment details required"
        );
        self.sink
            .update_details("payment_details_required", |details| {
                details.details_callback = Some(CallbackSlot::new(callback));
                details.input_details = input_details;
                details.pending_request = Some(request);
            });
    }
}

/// Exposes an SDK payment session as one observable, latest-value status.
///
/// Every listener call republishes the full merged snapshot. Getters resolve
/// with the first snapshot (current one included) where their field is set and
/// never resolve otherwise, so callers bring their own timeout.
///
/// # Examples
///
/// ```rust,ignore
/// let aggregator = PaymentStatusAggregator::new(sdk);
/// aggregator.create_new_payment();
///
/// let card = aggregator.get_payment_method_of(&PaymentType::Card).await?;
/// aggregator.select_payment_service(card)?;
///
/// let token = aggregator.get_token().await?;
/// aggregator.complete_payment(&encrypt_session(&token))?;
///
/// let result = aggregator.get_payment_result().await?;
/// ```
pub struct PaymentStatusAggregator {
    sdk: Arc<dyn PaymentSdk>,
    sink: Arc<StatusSink>,
    default_payment_type: PaymentType,
}

impl PaymentStatusAggregator {
    pub fn new(sdk: Arc<dyn PaymentSdk>) -> Self {
        Self {
            sdk,
            sink: Arc::new(StatusSink::new()),
            default_payment_type: PaymentType::Card,
        }
    }

    /// Aggregator preferring the configured default payment type.
    pub fn from_config(sdk: Arc<dyn PaymentSdk>, config_manager: &ConfigManager) -> Self {
        Self::new(sdk).with_default_payment_type(
            config_manager
                .get_config()
                .payment
                .default_payment_type
                .clone(),
        )
    }

    pub fn with_default_payment_type(mut self, payment_type: PaymentType) -> Self {
        self.default_payment_type = payment_type;
        self
    }

    pub fn default_payment_type(&self) -> &PaymentType {
        &self.default_payment_type
    }

    pub fn subscribe(&self) -> watch::Receiver<AggregatedPaymentStatus> {
        self.sink.status.subscribe()
    }

    /// Latest published snapshot.
    pub fn status(&self) -> AggregatedPaymentStatus {
        self.sink.status.borrow().clone()
    }

    pub fn is_ongoing_payment(&self) -> bool {
        self.sink.lock().session.is_some()
    }

    /// Starts a new SDK session, cancelling the ongoing one first.
    ///
    /// The cleared state and then the initial empty state of the new session
    /// are published before the SDK is started.
    pub fn create_new_payment(&self) -> Uuid {
        self.cancel_payment();

        let session_id = Uuid::new_v4();
        let generation = {
            let mut state = self.sink.lock();
            state.reset(Some(session_id));
            self.sink.publish(&mut state);
            state.generation
        };

        let session = self.sdk.create_session(
            Box::new(PaymentStatusListener {
                sink: SinkHandle::new(&self.sink, generation),
            }),
            Box::new(DetailsStatusListener {
                sink: SinkHandle::new(&self.sink, generation),
            }),
        );

        {
            let mut state = self.sink.lock();
            if state.generation != generation {
                drop(state);
                warn!(%session_id, "payment session replaced before it started");
                session.cancel();
                return session_id;
            }
            state.session = Some(Arc::clone(&session));
        }

        info!(%session_id, "payment session started");
        session.start();
        session_id
    }

    /// Cancels the ongoing session, publishing the cleared state.
    /// Returns false when no session was active.
    pub fn cancel_payment(&self) -> bool {
        let (session, session_id) = {
            let mut state = self.sink.lock();
            let Some(session) = state.session.take() else {
                return false;
            };
            let session_id = state.session_id;
            state.reset(None);
            self.sink.publish(&mut state);
            (session, session_id)
        };
        info!(session_id = ?session_id, "payment session cancelled");
        session.cancel();
        true
    }

    pub async fn get_token(&self) -> Result<String, PaymentError> {
        self.first_with(|status| status.token.clone()).await
    }

    pub async fn get_payment_result(&self) -> Result<PaymentRequestResult, PaymentError> {
        self.first_with(|status| status.result.clone()).await
    }

    pub async fn get_redirect_url(&self) -> Result<String, PaymentError> {
        self.first_with(|status| status.redirect_url.clone()).await
    }

    /// Session handle captured when the SDK asked for payment details.
    pub async fn get_payment_request(&self) -> Result<PaymentRequestHandle, PaymentError> {
        self.first_with(|status| status.pending_request.clone()).await
    }

    /// First available payment method of the given type.
    pub async fn get_payment_method(
        &self,
        payment_type: &str,
    ) -> Result<PaymentMethod, PaymentError> {
        self.first_with(|status| status.find_payment_method(payment_type).cloned())
            .await
    }

    pub async fn get_payment_method_of(
        &self,
        payment_type: &PaymentType,
    ) -> Result<PaymentMethod, PaymentError> {
        self.get_payment_method(payment_type.type_id()).await
    }

    /// First available payment method of the default payment type.
    pub async fn get_default_payment_method(&self) -> Result<PaymentMethod, PaymentError> {
        self.get_payment_method_of(&self.default_payment_type).await
    }

    /// Hands the encrypted payment data to the SDK.
    pub fn complete_payment(&self, session: &str) -> Result<(), PaymentError> {
        let callback = self.take_callback(
            |status| status.data_callback,
            "Not possible to create payment no callback available.",
        )?;
        callback.complete_with_payment_data(session.as_bytes().to_vec());
        Ok(())
    }

    pub fn select_payment_service(&self, service: PaymentMethod) -> Result<(), PaymentError> {
        let callback = self.take_callback(
            |status| status.service_callback,
            "Not possible to select payment service no callback available.",
        )?;
        callback.complete_with_payment_method(service);
        Ok(())
    }

    pub fn finish_uri(&self, uri: Url) -> Result<(), PaymentError> {
        let callback = self.take_callback(
            |status| status.uri_callback,
            "Not possible to finish redirect no callback available.",
        )?;
        callback.complete_with_uri(uri);
        Ok(())
    }

    pub fn finish_payment(&self, details: PaymentDetails) -> Result<(), PaymentError> {
        let callback = self.take_callback(
            |status| status.details_callback,
            "Not possible to finish payment with details no callback available.",
        )?;
        callback.complete_with_payment_details(details);
        Ok(())
    }

    async fn first_with<T, F>(&self, select: F) -> Result<T, PaymentError>
    where
        F: Fn(&AggregatedPaymentStatus) -> Option<T>,
    {
        let mut receiver = self.subscribe();
        let status = receiver
            .wait_for(|status| select(status).is_some())
            .await
            .map_err(|_| PaymentError::ChannelClosed)?;
        select(&*status).ok_or(PaymentError::ChannelClosed)
    }

    /// Takes a pending callback out of the latest snapshot and clears its slot.
    ///
    /// The slot is cleared and republished before the callback runs, since the
    /// SDK may report its next step from inside the callback.
    fn take_callback<T, F>(&self, slot: F, missing: &'static str) -> Result<Box<T>, PaymentError>
    where
        T: ?Sized,
        F: FnOnce(AggregatedPaymentStatus) -> Option<CallbackSlot<T>>,
    {
        let slot = slot(self.status()).ok_or(PaymentError::InvalidState(missing))?;
        let callback = slot.take()?;
        self.sink.clear_consumed_callbacks();
        Ok(callback)
    }
}

impl Drop for PaymentStatusAggregator {
    fn drop(&mut self) {
        self.cancel_payment();
    }
}
