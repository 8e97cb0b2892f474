//! Stripe webhook handling

use std::collections::HashMap;

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, info, instrument, warn};

use crate::error::BillingError;

/// Maximum age of a signed payload, in seconds
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Webhook event types we handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventType {
    CheckoutSessionCompleted,
    CustomerSubscriptionCreated,
    CustomerSubscriptionUpdated,
    CustomerSubscriptionDeleted,
    InvoicePaid,
    InvoicePaymentFailed,
    /// Acknowledged and ignored
    Unknown(String),
}

impl From<&str> for WebhookEventType {
    fn from(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "customer.subscription.created" => Self::CustomerSubscriptionCreated,
            "customer.subscription.updated" => Self::CustomerSubscriptionUpdated,
            "customer.subscription.deleted" => Self::CustomerSubscriptionDeleted,
            "invoice.paid" => Self::InvoicePaid,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl WebhookEventType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::CustomerSubscriptionCreated => "customer.subscription.created",
            Self::CustomerSubscriptionUpdated => "customer.subscription.updated",
            Self::CustomerSubscriptionDeleted => "customer.subscription.deleted",
            Self::InvoicePaid => "invoice.paid",
            Self::InvoicePaymentFailed => "invoice.payment_failed",
            Self::Unknown(other) => other,
        }
    }
}

/// Parsed webhook event
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub id: String,
    pub event_type: WebhookEventType,
    pub data: WebhookEventData,
    /// Unix timestamp
    pub created: i64,
}

/// Webhook event data
#[derive(Debug, Clone)]
pub enum WebhookEventData {
    CheckoutSession(CheckoutSessionData),
    Subscription(SubscriptionData),
    Invoice(InvoiceData),
    /// Raw JSON for unknown events
    Raw(serde_json::Value),
}

/// Checkout session completed data
#[derive(Debug, Clone)]
pub struct CheckoutSessionData {
    pub session_id: String,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub client_reference_id: Option<String>,
    pub payment_status: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Subscription event data
#[derive(Debug, Clone)]
pub struct SubscriptionData {
    pub subscription_id: String,
    pub customer_id: String,
    /// Raw Stripe status
    pub status: String,
    /// Price of the first item, used to infer the plan
    pub price_id: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Invoice event data
#[derive(Debug, Clone)]
pub struct InvoiceData {
    pub invoice_id: String,
    pub customer_id: String,
    pub subscription_id: Option<String>,
    pub billing_reason: Option<String>,
}

/// Webhook handler for verifying and parsing Stripe events
#[derive(Clone)]
pub struct WebhookHandler {
    webhook_secret: String,
}

impl WebhookHandler {
    /// Create a new webhook handler
    pub fn new(webhook_secret: impl Into<String>) -> Self {
        Self {
            webhook_secret: webhook_secret.into(),
        }
    }

    /// Verify and parse a webhook payload
    #[instrument(skip(self, payload, signature))]
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, BillingError> {
        self.verify_signature(payload, signature, Utc::now().timestamp())?;
        Self::parse(payload)
    }

    /// Parse an already verified payload
    pub fn parse(payload: &[u8]) -> Result<WebhookEvent, BillingError> {
        let raw_event: RawStripeEvent = serde_json::from_slice(payload)
            .map_err(|e| BillingError::WebhookError(e.to_string()))?;

        debug!(event_id = %raw_event.id, event_type = %raw_event.event_type, "Parsed webhook event");

        let event_type = WebhookEventType::from(raw_event.event_type.as_str());
        let data = Self::parse_event_data(&event_type, raw_event.data.object)?;

        Ok(WebhookEvent {
            id: raw_event.id,
            event_type,
            data,
            created: raw_event.created,
        })
    }

    /// Verify a `Stripe-Signature` header (`t=...,v1=...[,v1=...]`) at `now`.
    pub fn verify_signature(
        &self,
        payload: &[u8],
        signature: &str,
        now: i64,
    ) -> Result<(), BillingError> {
        let mut timestamp: Option<&str> = None;
        let mut candidates: Vec<&str> = Vec::new();

        for part in signature.split(',') {
            if let Some((key, value)) = part.trim().split_once('=') {
                match key {
                    "t" => timestamp = Some(value),
                    "v1" => candidates.push(value),
                    _ => {}
                }
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            warn!("Missing timestamp in webhook signature");
            BillingError::InvalidSignature("missing timestamp".to_string())
        })?;
        if candidates.is_empty() {
            warn!("Missing v1 signature in webhook signature");
            return Err(BillingError::InvalidSignature(
                "missing signature".to_string(),
            ));
        }

        let expected = self.sign(timestamp, payload)?;
        let matched = candidates
            .iter()
            .any(|candidate| bool::from(candidate.as_bytes().ct_eq(expected.as_bytes())));
        if !matched {
            warn!("Webhook signature verification failed");
            return Err(BillingError::InvalidSignature(
                "signature mismatch".to_string(),
            ));
        }

        let ts: i64 = timestamp
            .parse()
            .map_err(|_| BillingError::InvalidSignature("invalid timestamp".to_string()))?;
        if (now - ts).abs() > SIGNATURE_TOLERANCE_SECS {
            warn!(timestamp = ts, now = now, "Webhook timestamp outside tolerance");
            return Err(BillingError::InvalidSignature(
                "timestamp outside tolerance".to_string(),
            ));
        }

        Ok(())
    }

    /// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`
    fn sign(&self, timestamp: &str, payload: &[u8]) -> Result<String, BillingError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| BillingError::Internal("HMAC error".to_string()))?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Build a valid header for `payload`, as Stripe would
    pub fn signature_header(&self, payload: &[u8], timestamp: i64) -> Result<String, BillingError> {
        let sig = self.sign(&timestamp.to_string(), payload)?;
        Ok(format!("t={timestamp},v1={sig}"))
    }

    /// Parse event data based on type
    fn parse_event_data(
        event_type: &WebhookEventType,
        object: serde_json::Value,
    ) -> Result<WebhookEventData, BillingError> {
        let invalid = |e: serde_json::Error| BillingError::WebhookError(e.to_string());

        match event_type {
            WebhookEventType::CheckoutSessionCompleted => {
                let session: RawCheckoutSession = serde_json::from_value(object).map_err(invalid)?;
                Ok(WebhookEventData::CheckoutSession(CheckoutSessionData {
                    session_id: session.id,
                    customer_id: session.customer,
                    subscription_id: session.subscription,
                    client_reference_id: session.client_reference_id,
                    payment_status: session.payment_status,
                    metadata: session.metadata,
                }))
            }
            WebhookEventType::CustomerSubscriptionCreated
            | WebhookEventType::CustomerSubscriptionUpdated
            | WebhookEventType::CustomerSubscriptionDeleted => {
                let sub: RawSubscription = serde_json::from_value(object).map_err(invalid)?;
                let price_id = sub
                    .items
                    .and_then(|items| items.data.into_iter().next())
                    .map(|item| item.price.id);
                Ok(WebhookEventData::Subscription(SubscriptionData {
                    subscription_id: sub.id,
                    customer_id: sub.customer,
                    status: sub.status,
                    price_id,
                    metadata: sub.metadata,
                }))
            }
            WebhookEventType::InvoicePaid | WebhookEventType::InvoicePaymentFailed => {
                let inv: RawInvoice = serde_json::from_value(object).map_err(invalid)?;
                Ok(WebhookEventData::Invoice(InvoiceData {
                    invoice_id: inv.id,
                    customer_id: inv.customer,
                    subscription_id: inv.subscription,
                    billing_reason: inv.billing_reason,
                }))
            }
            WebhookEventType::Unknown(kind) => {
                info!(event_type = %kind, "Received unhandled webhook event type");
                Ok(WebhookEventData::Raw(object))
            }
        }
    }
}

// Raw Stripe event for parsing
#[derive(Debug, Deserialize)]
struct RawStripeEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
    created: i64,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawCheckoutSession {
    id: String,
    customer: Option<String>,
    subscription: Option<String>,
    client_reference_id: Option<String>,
    payment_status: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawSubscription {
    id: String,
    customer: String,
    status: String,
    items: Option<RawList<RawSubscriptionItem>>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawList<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct RawSubscriptionItem {
    price: RawPrice,
}

#[derive(Debug, Deserialize)]
struct RawPrice {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawInvoice {
    id: String,
    customer: String,
    subscription: Option<String>,
    billing_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "whsec_test_secret";

    fn payload() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": "customer.subscription.updated",
            "created": 1_700_000_000,
            "data": {"object": {
                "id": "sub_1",
                "customer": "cus_1",
                "status": "past_due",
                "items": {"data": [{"price": {"id": "price_pro"}}]},
                "metadata": {"user_id": "abc"}
            }}
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_signature_accepted() {
        let handler = WebhookHandler::new(SECRET);
        let body = payload();
        let now = 1_700_000_100;
        let header = handler.signature_header(&body, now).unwrap();

        assert!(handler.verify_signature(&body, &header, now).is_ok());
    }

    #[test]
    fn test_any_v1_may_match() {
        let handler = WebhookHandler::new(SECRET);
        let body = payload();
        let good = handler.signature_header(&body, 1_000).unwrap();
        let sig = good.split_once(",v1=").unwrap().1;
        let header = format!("t=1000,v1=deadbeef,v1={sig}");

        assert!(handler.verify_signature(&body, &header, 1_000).is_ok());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let handler = WebhookHandler::new(SECRET);
        let body = payload();
        let header = handler.signature_header(&body, 1_000).unwrap();
        let mut tampered = body.clone();
        tampered.push(b' ');

        let err = handler.verify_signature(&tampered, &header, 1_000).unwrap_err();
        assert!(matches!(err, BillingError::InvalidSignature(_)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = payload();
        let header = WebhookHandler::new("whsec_other")
            .signature_header(&body, 1_000)
            .unwrap();

        assert!(WebhookHandler::new(SECRET)
            .verify_signature(&body, &header, 1_000)
            .is_err());
    }

    #[test]
    fn test_stale_and_future_timestamps_rejected() {
        let handler = WebhookHandler::new(SECRET);
        let body = payload();
        let header = handler.signature_header(&body, 1_000).unwrap();

        assert!(handler.verify_signature(&body, &header, 1_300).is_ok());
        assert!(handler.verify_signature(&body, &header, 1_301).is_err());
        assert!(handler.verify_signature(&body, &header, 699).is_err());
    }

    #[test]
    fn test_malformed_headers_rejected() {
        let handler = WebhookHandler::new(SECRET);
        let body = payload();

        for header in ["", "v1=abc", "t=1000", "garbage", "t=abc,v1=def"] {
            assert!(
                handler.verify_signature(&body, header, 1_000).is_err(),
                "{header}"
            );
        }
    }

    #[test]
    fn test_subscription_parsing() {
        let event = WebhookHandler::parse(&payload()).unwrap();
        assert_eq!(event.event_type, WebhookEventType::CustomerSubscriptionUpdated);

        let WebhookEventData::Subscription(sub) = event.data else {
            panic!("expected subscription data");
        };
        assert_eq!(sub.status, "past_due");
        assert_eq!(sub.price_id.as_deref(), Some("price_pro"));
        assert_eq!(sub.metadata.get("user_id").map(String::as_str), Some("abc"));
    }

    #[test]
    fn test_unknown_event_is_raw() {
        let body = serde_json::to_vec(&json!({
            "id": "evt_2",
            "type": "charge.refunded",
            "created": 1,
            "data": {"object": {"id": "ch_1"}}
        }))
        .unwrap();

        let event = WebhookHandler::parse(&body).unwrap();
        assert_eq!(event.event_type.as_str(), "charge.refunded");
        assert!(matches!(event.data, WebhookEventData::Raw(_)));
    }
}
