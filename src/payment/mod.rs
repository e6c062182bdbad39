//! Card/PayPal checkout through an external payment SDK.
//!
//! The SDK drives its own flow (method selection, payment data, redirect,
//! extra details, result) and reports each step through two listener
//! interfaces. [`aggregator::PaymentStatusAggregator`] folds those calls into
//! a single observable [`status::AggregatedPaymentStatus`].
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

pub mod aggregator;
pub mod status;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),
    #[error("Callback already consumed")]
    CallbackConsumed,
    #[error("No active payment session")]
    NoActiveSession,
    #[error("Payment status channel closed")]
    ChannelClosed,
    #[error("Payment method not found: {0}")]
    PaymentMethodNotFound(String),
}

/// Payment method kinds the wallet knows how to render.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PaymentType {
    Card,
    PayPal,
    Other(String),
}

impl PaymentType {
    /// Type identifier used by the SDK's payment methods.
    pub fn type_id(&self) -> &str {
        match self {
            PaymentType::Card => "card",
            PaymentType::PayPal => "paypal",
            PaymentType::Other(id) => id,
        }
    }
}

impl From<&str> for PaymentType {
    fn from(value: &str) -> Self {
        match value {
            "card" => PaymentType::Card,
            "paypal" => PaymentType::PayPal,
            other => PaymentType::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentMethod {
    #[serde(rename = "type")]
    pub payment_type: String,
    pub name: String,
    pub logo_url: Option<String>,
}

impl PaymentMethod {
    pub fn new(payment_type: &str, name: &str) -> Self {
        Self {
            payment_type: payment_type.to_string(),
            name: name.to_string(),
            logo_url: None,
        }
    }

    pub fn is_of_type(&self, payment_type: &str) -> bool {
        self.payment_type == payment_type
    }
}

/// A field the SDK asks the user to fill in (card holder, 3-D Secure answer, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputDetail {
    pub key: String,
    pub input_type: String,
    pub optional: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentDetails {
    pub payment_method: PaymentMethod,
    pub values: HashMap<String, String>,
}

impl PaymentDetails {
    pub fn new(payment_method: PaymentMethod) -> Self {
        Self {
            payment_method,
            values: HashMap::new(),
        }
    }

    pub fn fill(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Payment {
    pub payload: String,
    pub status: String,
}

/// Terminal outcome of a payment session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentRequestResult {
    Processed(Payment),
    Failed(String),
    Cancelled,
}

impl PaymentRequestResult {
    pub fn is_processed(&self) -> bool {
        matches!(self, PaymentRequestResult::Processed(_))
    }
}

/// One run of the SDK checkout flow.
pub trait PaymentSession: Send + Sync {
    fn start(&self);
    fn cancel(&self);
}

/// Handle to the SDK session that issued a listener call.
#[derive(Clone)]
pub struct PaymentRequestHandle(Arc<dyn PaymentSession>);

impl PaymentRequestHandle {
    pub fn new(session: Arc<dyn PaymentSession>) -> Self {
        Self(session)
    }

    pub fn session(&self) -> &Arc<dyn PaymentSession> {
        &self.0
    }

    pub fn same_session(&self, other: &PaymentRequestHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for PaymentRequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PaymentRequestHandle({:p})", Arc::as_ptr(&self.0))
    }
}

pub trait PaymentDataCallback: Send {
    fn complete_with_payment_data(self: Box<Self>, data: Vec<u8>);
}

pub trait PaymentMethodCallback: Send {
    fn complete_with_payment_method(self: Box<Self>, method: PaymentMethod);
}

pub trait UriCallback: Send {
    fn complete_with_uri(self: Box<Self>, uri: Url);
}

pub trait PaymentDetailsCallback: Send {
    fn complete_with_payment_details(self: Box<Self>, details: PaymentDetails);
}

/// Payment lifecycle events: payment data requested and final result.
pub trait PaymentRequestListener: Send + Sync {
    fn on_payment_data_requested(
        &self,
        request: PaymentRequestHandle,
        token: String,
        callback: Box<dyn PaymentDataCallback>,
    );

    fn on_payment_result(&self, request: PaymentRequestHandle, result: PaymentRequestResult);
}

/// Details lifecycle events: method selection, redirect and extra input.
pub trait PaymentRequestDetailsListener: Send + Sync {
    fn on_payment_method_selection_required(
        &self,
        request: PaymentRequestHandle,
        recurring_methods: Vec<PaymentMethod>,
        other_methods: Vec<PaymentMethod>,
        callback: Box<dyn PaymentMethodCallback>,
    );

    fn on_redirect_required(
        &self,
        request: PaymentRequestHandle,
        redirect_url: String,
        callback: Box<dyn UriCallback>,
    );

    fn on_payment_details_required(
        &self,
        request: PaymentRequestHandle,
        input_details: Vec<InputDetail>,
        callback: Box<dyn PaymentDetailsCallback>,
    );
}

/// Entry point of the external payment SDK.
pub trait PaymentSdk: Send + Sync {
    fn create_session(
        &self,
        payment_listener: Box<dyn PaymentRequestListener>,
        details_listener: Box<dyn PaymentRequestDetailsListener>,
    ) -> Arc<dyn PaymentSession>;
}
