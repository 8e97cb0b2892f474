//! Stripe payment provider implementation

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use inrooms_types::{CheckoutKind, CheckoutSession};

use crate::config::BillingConfig;
use crate::error::BillingError;
use crate::provider::{CheckoutRequest, PaymentMethod, PaymentProvider};

/// Stripe payment provider
#[derive(Clone)]
pub struct StripeProvider {
    client: Client,
    config: BillingConfig,
}

impl StripeProvider {
    /// Create a new Stripe provider
    pub fn new(config: BillingConfig) -> Result<Self, BillingError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BillingError::Internal(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Make authenticated request to Stripe
    async fn stripe_request<T, F>(
        &self,
        method: Method,
        endpoint: &str,
        form: Option<&F>,
    ) -> Result<T, BillingError>
    where
        T: for<'de> Deserialize<'de>,
        F: Serialize + ?Sized,
    {
        let url = format!("{}{endpoint}", self.config.api_base);

        let mut request = self
            .client
            .request(method, &url)
            .basic_auth(&self.config.stripe_secret_key, Option::<&str>::None);

        if let Some(form_data) = form {
            request = request.form(form_data);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "Stripe API request failed");
            BillingError::provider(e.to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Stripe API error");
            return Err(BillingError::ProviderError {
                status: Some(status.as_u16()),
                message: format!("Stripe API error: {status}"),
            });
        }

        response.json::<T>().await.map_err(|e| {
            error!(error = %e, "Failed to parse Stripe response");
            BillingError::Internal(e.to_string())
        })
    }
}

/// Form fields for a checkout session
fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
    let mode = match request.kind {
        CheckoutKind::Subscription => "subscription",
        CheckoutKind::FeaturedDemo => "payment",
    };

    let mut form = vec![
        ("customer".to_string(), request.customer_id.clone()),
        ("mode".to_string(), mode.to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        ("line_items[0][price]".to_string(), request.price_id.clone()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        ("metadata[kind]".to_string(), request.kind.as_str().to_string()),
    ];
    if let Some(reference) = &request.client_reference_id {
        form.push(("client_reference_id".to_string(), reference.clone()));
    }
    for (key, value) in &request.metadata {
        form.push((format!("metadata[{key}]"), value.clone()));
        // Subscription events only see the subscription's own metadata
        if request.kind == CheckoutKind::Subscription {
            form.push((format!("subscription_data[metadata][{key}]"), value.clone()));
        }
    }
    form
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    #[instrument(skip(self))]
    async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> Result<String, BillingError> {
        debug!(email = %email, "Creating Stripe customer");

        let mut form: Vec<(&str, &str)> = vec![("email", email)];
        if let Some(n) = name {
            form.push(("name", n));
        }

        let customer: StripeCustomer = self
            .stripe_request(Method::POST, "/customers", Some(&form))
            .await?;
        Ok(customer.id)
    }

    #[instrument(skip(self, request), fields(kind = request.kind.as_str()))]
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, BillingError> {
        debug!(customer_id = %request.customer_id, "Creating checkout session");

        let form = checkout_form(request);
        let session: StripeCheckoutSession = self
            .stripe_request(Method::POST, "/checkout/sessions", Some(&form))
            .await?;

        let url = session
            .url
            .ok_or_else(|| BillingError::provider("checkout session has no url"))?;
        Ok(CheckoutSession {
            session_id: session.id,
            url,
        })
    }

    #[instrument(skip(self))]
    async fn get_payment_method(
        &self,
        payment_method_id: &str,
    ) -> Result<PaymentMethod, BillingError> {
        let method: StripePaymentMethod = self
            .stripe_request(
                Method::GET,
                &format!("/payment_methods/{payment_method_id}"),
                None::<&[(&str, &str)]>,
            )
            .await
            .map_err(|e| match e {
                BillingError::ProviderError {
                    status: Some(404), ..
                } => BillingError::PaymentMethodNotFound,
                other => other,
            })?;

        Ok(PaymentMethod {
            id: method.id,
            customer_id: method.customer,
        })
    }

    #[instrument(skip(self))]
    async fn detach_payment_method(&self, payment_method_id: &str) -> Result<(), BillingError> {
        debug!("Detaching payment method");

        let _: StripePaymentMethod = self
            .stripe_request(
                Method::POST,
                &format!("/payment_methods/{payment_method_id}/detach"),
                None::<&[(&str, &str)]>,
            )
            .await?;
        Ok(())
    }
}

// Stripe API response types

/// Stripe customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

/// Stripe checkout session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    /// Hosted page URL; absent once the session is complete
    pub url: Option<String>,
    pub customer: Option<String>,
}

/// Stripe payment method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripePaymentMethod {
    pub id: String,
    pub customer: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: CheckoutKind) -> CheckoutRequest {
        CheckoutRequest {
            customer_id: "cus_1".into(),
            price_id: "price_1".into(),
            kind,
            metadata: vec![("user_id".into(), "u-1".into())],
            client_reference_id: Some("u-1".into()),
            success_url: "https://app/ok".into(),
            cancel_url: "https://app/cancel".into(),
        }
    }

    fn has(form: &[(String, String)], key: &str, value: &str) -> bool {
        form.iter().any(|(k, v)| k == key && v == value)
    }

    #[test]
    fn test_subscription_form_copies_metadata_to_subscription() {
        let form = checkout_form(&request(CheckoutKind::Subscription));
        assert!(has(&form, "mode", "subscription"));
        assert!(has(&form, "metadata[kind]", "subscription"));
        assert!(has(&form, "metadata[user_id]", "u-1"));
        assert!(has(&form, "subscription_data[metadata][user_id]", "u-1"));
    }

    #[test]
    fn test_featured_demo_form_is_one_time_payment() {
        let form = checkout_form(&request(CheckoutKind::FeaturedDemo));
        assert!(has(&form, "mode", "payment"));
        assert!(has(&form, "metadata[kind]", "featured_demo"));
        assert!(!form.iter().any(|(k, _)| k.starts_with("subscription_data")));
    }
}
