use crate::payment::{
    InputDetail, PaymentDataCallback, PaymentDetailsCallback, PaymentError, PaymentMethod,
    PaymentMethodCallback, PaymentRequestHandle, PaymentRequestResult, UriCallback,
};
use std::fmt;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Shared, one-shot holder for an SDK callback.
///
/// Every snapshot that carries the slot points at the same cell, so taking
/// the callback through any snapshot consumes it for all of them.
pub struct CallbackSlot<T: ?Sized> {
    cell: Arc<Mutex<Option<Box<T>>>>,
}

impl<T: ?Sized> CallbackSlot<T> {
    pub fn new(callback: Box<T>) -> Self {
        Self {
            cell: Arc::new(Mutex::new(Some(callback))),
        }
    }

    /// Takes the callback out. A second take fails with `CallbackConsumed`.
    pub fn take(&self) -> Result<Box<T>, PaymentError> {
        self.cell
            .lock()
            .map_err(|_| PaymentError::CallbackConsumed)?
            .take()
            .ok_or(PaymentError::CallbackConsumed)
    }

    pub fn is_consumed(&self) -> bool {
        self.cell.lock().map(|cell| cell.is_none()).unwrap_or(true)
    }
}

impl<T: ?Sized> Clone for CallbackSlot<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: ?Sized> fmt::Debug for CallbackSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_consumed() {
            "consumed"
        } else {
            "pending"
        };
        write!(f, "CallbackSlot({})", state)
    }
}

/// Everything the payment lifecycle listener has seen for the current session.
#[derive(Debug, Clone, Default)]
pub struct PaymentState {
    pub token: Option<String>,
    pub data_callback: Option<CallbackSlot<dyn PaymentDataCallback>>,
    pub result: Option<PaymentRequestResult>,
}

impl PaymentState {
    fn drop_consumed(&mut self) -> bool {
        drop_if_consumed(&mut self.data_callback)
    }
}

/// Everything the details lifecycle listener has seen for the current session.
#[derive(Debug, Clone, Default)]
pub struct DetailsState {
    pub service_callback: Option<CallbackSlot<dyn PaymentMethodCallback>>,
    pub available_services: Vec<PaymentMethod>,
    pub recurring_services: Vec<PaymentMethod>,
    pub details_callback: Option<CallbackSlot<dyn PaymentDetailsCallback>>,
    pub input_details: Vec<InputDetail>,
    pub pending_request: Option<PaymentRequestHandle>,
    pub uri_callback: Option<CallbackSlot<dyn UriCallback>>,
    pub redirect_url: Option<String>,
}

impl DetailsState {
    fn drop_consumed(&mut self) -> bool {
        let service = drop_if_consumed(&mut self.service_callback);
        let details = drop_if_consumed(&mut self.details_callback);
        let uri = drop_if_consumed(&mut self.uri_callback);
        service || details || uri
    }
}

fn drop_if_consumed<T: ?Sized>(slot: &mut Option<CallbackSlot<T>>) -> bool {
    if slot.as_ref().is_some_and(CallbackSlot::is_consumed) {
        *slot = None;
        return true;
    }
    false
}

/// Snapshot of a payment session, merged from both listener roles.
///
/// Replaced wholesale on every publish.
#[derive(Debug, Clone, Default)]
pub struct AggregatedPaymentStatus {
    pub session_id: Option<Uuid>,
    pub version: u64,
    pub token: Option<String>,
    pub data_callback: Option<CallbackSlot<dyn PaymentDataCallback>>,
    pub result: Option<PaymentRequestResult>,
    pub service_callback: Option<CallbackSlot<dyn PaymentMethodCallback>>,
    pub available_services: Vec<PaymentMethod>,
    pub recurring_services: Vec<PaymentMethod>,
    pub details_callback: Option<CallbackSlot<dyn PaymentDetailsCallback>>,
    pub input_details: Vec<InputDetail>,
    pub pending_request: Option<PaymentRequestHandle>,
    pub uri_callback: Option<CallbackSlot<dyn UriCallback>>,
    pub redirect_url: Option<String>,
}

impl AggregatedPaymentStatus {
    pub fn from(
        session_id: Option<Uuid>,
        version: u64,
        payment: &PaymentState,
        details: &DetailsState,
    ) -> Self {
        Self {
            session_id,
            version,
            token: payment.token.clone(),
            data_callback: payment.data_callback.clone(),
            result: payment.result.clone(),
            service_callback: details.service_callback.clone(),
            available_services: details.available_services.clone(),
            recurring_services: details.recurring_services.clone(),
            details_callback: details.details_callback.clone(),
            input_details: details.input_details.clone(),
            pending_request: details.pending_request.clone(),
            uri_callback: details.uri_callback.clone(),
            redirect_url: details.redirect_url.clone(),
        }
    }

    pub fn find_payment_method(&self, payment_type: &str) -> Option<&PaymentMethod> {
        self.available_services
            .iter()
            .find(|method| method.is_of_type(payment_type))
    }

    /// True until the SDK asks for anything or reports a result.
    pub fn is_empty(&self) -> bool {
        self.token.is_none()
            && self.data_callback.is_none()
            && self.result.is_none()
            && self.service_callback.is_none()
            && self.details_callback.is_none()
            && self.uri_callback.is_none()
            && self.redirect_url.is_none()
            && self.pending_request.is_none()
            && self.available_services.is_empty()
            && self.recurring_services.is_empty()
    }
}

/// Drops consumed callback slots from both listener states.
/// Returns whether anything changed.
pub(crate) fn drop_consumed(payment: &mut PaymentState, details: &mut DetailsState) -> bool {
    let payment_changed = payment.drop_consumed();
    let details_changed = details.drop_consumed();
    payment_changed || details_changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingUri(Arc<AtomicUsize>);

    impl UriCallback for CountingUri {
        fn complete_with_uri(self: Box<Self>, _uri: url::Url) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn callback_slot_is_shared_between_clones() {
        let calls = Arc::new(AtomicUsize::new(0));
        let callback: Box<dyn UriCallback> = Box::new(CountingUri(calls.clone()));
        let slot = CallbackSlot::new(callback);
        let copy = slot.clone();

        slot.take()
            .unwrap()
            .complete_with_uri(url::Url::parse("app://done").unwrap());

        assert!(copy.is_consumed());
        assert!(matches!(copy.take(), Err(PaymentError::CallbackConsumed)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(format!("{:?}", copy), "CallbackSlot(consumed)");
    }

    #[test]
    fn consumed_slots_are_dropped_from_state() {
        let calls = Arc::new(AtomicUsize::new(0));
        let callback: Box<dyn UriCallback> = Box::new(CountingUri(calls));
        let mut details = DetailsState {
            uri_callback: Some(CallbackSlot::new(callback)),
            redirect_url: Some("https://bank.example/3ds".to_string()),
            ..Default::default()
        };
        let mut payment = PaymentState::default();

        assert!(!drop_consumed(&mut payment, &mut details));
        let _ = details.uri_callback.as_ref().unwrap().take().unwrap();
        assert!(drop_consumed(&mut payment, &mut details));
        assert!(details.uri_callback.is_none());
        assert_eq!(details.redirect_url.as_deref(), Some("https://bank.example/3ds"));
    }

    #[test]
    fn snapshot_merges_both_listener_states() {
        let payment = PaymentState {
            token: Some("tok".to_string()),
            ..Default::default()
        };
        let details = DetailsState {
            available_services: vec![
                PaymentMethod::new("paypal", "PayPal"),
                PaymentMethod::new("card", "Credit Card"),
            ],
            ..Default::default()
        };
        let status = AggregatedPaymentStatus::from(Some(Uuid::new_v4()), 3, &payment, &details);
        assert_eq!(status.version, 3);
        assert_eq!(status.token.as_deref(), Some("tok"));
        assert_eq!(status.find_payment_method("card").unwrap().name, "Credit Card");
        assert!(status.find_payment_method("ideal").is_none());
        assert!(!status.is_empty());
        assert!(AggregatedPaymentStatus::default().is_empty());
    }
}
