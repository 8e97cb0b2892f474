//! Billing service
//!
//! Opens checkouts and turns verified Stripe webhooks into subscription
//! changes on the authoritative user row. Every user change goes through
//! `apply_subscription_change`, which flags the row for Firestore sync.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};

use inrooms_db::{CreateQuote, QuoteRow, Repositories, SubscriptionChange, UserRow};
use inrooms_types::{
    CheckoutKind, CheckoutSession, DemoId, Plan, SubscriptionStatus, UserId, FEATURED_DEMO_DAYS,
};

use crate::config::BillingConfig;
use crate::error::BillingError;
use crate::provider::{CheckoutRequest, PaymentProvider};
use crate::stripe::StripeProvider;
use crate::webhook::{
    CheckoutSessionData, InvoiceData, SubscriptionData, WebhookEvent, WebhookEventData,
    WebhookEventType, WebhookHandler,
};

/// What happened to a delivered webhook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied,
    /// Valid but nothing to do (unhandled type, unknown user)
    Ignored,
    /// Event ID seen before
    Duplicate,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Ignored => "ignored",
            Self::Duplicate => "duplicate",
        }
    }
}

/// Enterprise quote request from the pricing page
#[derive(Debug, Clone)]
pub struct CustomQuoteRequest {
    pub name: String,
    pub email: String,
    pub company: String,
    pub team_size: Option<i32>,
    pub message: Option<String>,
}

/// Billing service
#[derive(Clone)]
pub struct BillingService {
    repos: Repositories,
    provider: Arc<dyn PaymentProvider>,
    webhooks: WebhookHandler,
    config: BillingConfig,
}

impl BillingService {
    /// Create a billing service backed by Stripe
    pub fn new(repos: Repositories, config: BillingConfig) -> Result<Self, BillingError> {
        let provider = StripeProvider::new(config.clone())?;
        Ok(Self::with_provider(repos, Arc::new(provider), config))
    }

    pub fn with_provider(
        repos: Repositories,
        provider: Arc<dyn PaymentProvider>,
        config: BillingConfig,
    ) -> Self {
        Self {
            webhooks: WebhookHandler::new(&config.stripe_webhook_secret),
            repos,
            provider,
            config,
        }
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Checkout
    // ------------------------------------------------------------------

    /// Start a plan subscription checkout
    #[instrument(skip(self, success_url, cancel_url))]
    pub async fn create_subscription_checkout(
        &self,
        user_id: UserId,
        plan: Plan,
        success_url: Option<&str>,
        cancel_url: Option<&str>,
    ) -> Result<CheckoutSession, BillingError> {
        let price_id = self
            .config
            .get_price_id(plan)
            .ok_or_else(|| BillingError::PriceNotConfigured(plan.to_string()))?
            .to_string();
        let user = self.find_user(user_id).await?;
        let customer_id = self.ensure_customer(&user).await?;

        let request = CheckoutRequest {
            customer_id,
            price_id,
            kind: CheckoutKind::Subscription,
            metadata: vec![
                ("user_id".to_string(), user_id.to_string()),
                ("plan".to_string(), plan.as_str().to_string()),
            ],
            client_reference_id: Some(user_id.to_string()),
            success_url: self.redirect_url(success_url, &self.config.default_success_url)?,
            cancel_url: self.redirect_url(cancel_url, &self.config.default_cancel_url)?,
        };

        self.open_checkout(&request).await
    }

    /// Start a one-time checkout that promotes a demo
    #[instrument(skip(self, success_url, cancel_url))]
    pub async fn create_featured_demo_checkout(
        &self,
        user_id: UserId,
        demo_id: DemoId,
        success_url: Option<&str>,
        cancel_url: Option<&str>,
    ) -> Result<CheckoutSession, BillingError> {
        let price_id = self
            .config
            .featured_demo_price_id
            .clone()
            .ok_or_else(|| BillingError::PriceNotConfigured("featured demo".to_string()))?;

        let demo = self
            .repos
            .demos
            .find_by_id(demo_id)
            .await?
            .ok_or(BillingError::DemoNotFound)?;
        if demo.host_id != user_id.as_uuid() {
            return Err(BillingError::NotDemoHost);
        }

        let user = self.find_user(user_id).await?;
        let customer_id = self.ensure_customer(&user).await?;

        let request = CheckoutRequest {
            customer_id,
            price_id,
            kind: CheckoutKind::FeaturedDemo,
            metadata: vec![
                ("user_id".to_string(), user_id.to_string()),
                ("demo_id".to_string(), demo_id.to_string()),
            ],
            client_reference_id: Some(user_id.to_string()),
            success_url: self.redirect_url(success_url, &self.config.default_success_url)?,
            cancel_url: self.redirect_url(cancel_url, &self.config.default_cancel_url)?,
        };

        self.open_checkout(&request).await
    }

    async fn open_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutSession, BillingError> {
        let session = self.provider.create_checkout_session(request).await?;
        metrics::counter!("billing_checkouts_created_total", "kind" => request.kind.as_str())
            .increment(1);
        info!(session_id = %session.session_id, kind = request.kind.as_str(), "Checkout session created");
        Ok(session)
    }

    fn redirect_url(&self, requested: Option<&str>, default: &str) -> Result<String, BillingError> {
        match requested {
            None => Ok(default.to_string()),
            Some(url) if url.starts_with("https://") || url.starts_with("http://") => {
                Ok(url.to_string())
            }
            Some(_) => Err(BillingError::InvalidInput(
                "redirect URLs must be http(s)".to_string(),
            )),
        }
    }

    async fn find_user(&self, user_id: UserId) -> Result<UserRow, BillingError> {
        self.repos
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(BillingError::UserNotFound)
    }

    /// Stripe customer for a user, created on first use
    async fn ensure_customer(&self, user: &UserRow) -> Result<String, BillingError> {
        if let Some(id) = &user.stripe_customer_id {
            return Ok(id.clone());
        }
        let customer_id = self
            .provider
            .create_customer(&user.email, user.display_name.as_deref())
            .await?;
        self.repos
            .users
            .set_stripe_customer_id(user.user_id(), &customer_id)
            .await?;
        info!(user_id = %user.id, "Created Stripe customer");
        Ok(customer_id)
    }

    // ------------------------------------------------------------------
    // Payment methods and quotes
    // ------------------------------------------------------------------

    /// Detach a saved payment method after checking it belongs to the user
    #[instrument(skip(self))]
    pub async fn delete_payment_method(
        &self,
        user_id: UserId,
        payment_method_id: &str,
    ) -> Result<(), BillingError> {
        if !payment_method_id.starts_with("pm_") || payment_method_id.len() > 255 {
            return Err(BillingError::InvalidInput(
                "invalid payment method id".to_string(),
            ));
        }

        let user = self.find_user(user_id).await?;
        let customer_id = user
            .stripe_customer_id
            .ok_or(BillingError::CustomerNotFound)?;

        let method = self.provider.get_payment_method(payment_method_id).await?;
        if method.customer_id.as_deref() != Some(customer_id.as_str()) {
            warn!("Refusing to detach payment method owned by another customer");
            return Err(BillingError::PaymentMethodNotOwned);
        }

        self.provider.detach_payment_method(payment_method_id).await?;
        info!("Payment method detached");
        Ok(())
    }

    /// Store an enterprise quote request
    #[instrument(skip(self, request))]
    pub async fn submit_custom_quote(
        &self,
        request: CustomQuoteRequest,
    ) -> Result<QuoteRow, BillingError> {
        let name = required(&request.name, "name", 200)?;
        let company = required(&request.company, "company", 200)?;
        let email = required(&request.email, "email", 254)?;
        if !email.contains('@') {
            return Err(BillingError::InvalidInput("invalid email".to_string()));
        }
        if request.team_size.is_some_and(|n| !(1..=100_000).contains(&n)) {
            return Err(BillingError::InvalidInput(
                "team_size must be between 1 and 100000".to_string(),
            ));
        }
        if request.message.as_ref().is_some_and(|m| m.len() > 5000) {
            return Err(BillingError::InvalidInput(
                "message too long (max 5000 chars)".to_string(),
            ));
        }

        let quote = self
            .repos
            .quotes
            .create(CreateQuote {
                name,
                email,
                company,
                team_size: request.team_size,
                message: request.message,
            })
            .await?;

        info!(quote_id = %quote.id, "Custom quote submitted");
        Ok(quote)
    }

    // ------------------------------------------------------------------
    // Webhooks
    // ------------------------------------------------------------------

    /// Verify, de-duplicate and apply a Stripe webhook delivery
    #[instrument(skip(self, payload, signature))]
    pub async fn process_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookOutcome, BillingError> {
        let event = self.webhooks.verify_and_parse(payload, signature)?;

        // Claim before applying so concurrent deliveries of one event
        // cannot both apply it
        let claimed = self
            .repos
            .webhook_events
            .claim(&event.id, event.event_type.as_str())
            .await?;
        if !claimed {
            info!(event_id = %event.id, "Duplicate webhook delivery");
            return Ok(WebhookOutcome::Duplicate);
        }

        let outcome = match self.apply_event(&event).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Err(release_err) = self.repos.webhook_events.release(&event.id).await {
                    warn!(event_id = %event.id, error = %release_err, "Failed to release webhook claim");
                }
                return Err(e);
            }
        };

        info!(
            event_id = %event.id,
            event_type = event.event_type.as_str(),
            outcome = outcome.as_str(),
            "Webhook processed"
        );
        Ok(outcome)
    }

    async fn apply_event(&self, event: &WebhookEvent) -> Result<WebhookOutcome, BillingError> {
        let at = DateTime::from_timestamp(event.created, 0)
            .ok_or_else(|| BillingError::WebhookError("invalid event timestamp".to_string()))?;

        match &event.data {
            WebhookEventData::CheckoutSession(session) => {
                self.on_checkout_completed(session, at).await
            }
            WebhookEventData::Subscription(sub) => {
                let deleted = event.event_type == WebhookEventType::CustomerSubscriptionDeleted;
                self.on_subscription_changed(sub, deleted, at).await
            }
            WebhookEventData::Invoice(invoice) => {
                let paid = event.event_type == WebhookEventType::InvoicePaid;
                self.on_invoice(invoice, paid, at).await
            }
            WebhookEventData::Raw(_) => Ok(WebhookOutcome::Ignored),
        }
    }

    async fn on_checkout_completed(
        &self,
        session: &CheckoutSessionData,
        at: DateTime<Utc>,
    ) -> Result<WebhookOutcome, BillingError> {
        let kind = match session.metadata.get("kind") {
            Some(kind) => kind
                .parse::<CheckoutKind>()
                .map_err(|e| BillingError::WebhookError(e.to_string()))?,
            None => CheckoutKind::Subscription,
        };

        match kind {
            CheckoutKind::Subscription => self.fulfil_subscription(session, at).await,
            CheckoutKind::FeaturedDemo => self.fulfil_featured_demo(session).await,
        }
    }

    async fn fulfil_subscription(
        &self,
        session: &CheckoutSessionData,
        at: DateTime<Utc>,
    ) -> Result<WebhookOutcome, BillingError> {
        let plan = session
            .metadata
            .get("plan")
            .ok_or_else(|| BillingError::WebhookError("checkout without plan".to_string()))?
            .parse::<Plan>()
            .map_err(|e| BillingError::WebhookError(e.to_string()))?;

        let mut metadata = session.metadata.clone();
        if let Some(reference) = &session.client_reference_id {
            metadata
                .entry("user_id".to_string())
                .or_insert_with(|| reference.clone());
        }
        let Some(user) = self
            .resolve_user(&metadata, session.customer_id.as_deref())
            .await?
        else {
            return Ok(WebhookOutcome::Ignored);
        };

        if let Some(customer_id) = &session.customer_id {
            if user.stripe_customer_id.as_deref() != Some(customer_id.as_str()) {
                self.repos
                    .users
                    .set_stripe_customer_id(user.user_id(), customer_id)
                    .await?;
            }
        }

        let change = SubscriptionChange {
            status: Some(SubscriptionStatus::Active),
            plan: Some(plan),
            events_quota: Some(plan.events_quota()),
            reset_usage: true,
            stripe_subscription_id: session.subscription_id.clone(),
            stripe_event_at: Some(at),
        };
        if !self.apply_change(&user, change).await? {
            return Ok(WebhookOutcome::Ignored);
        }

        info!(user_id = %user.id, plan = %plan, "Subscription activated");
        Ok(WebhookOutcome::Applied)
    }

    async fn fulfil_featured_demo(
        &self,
        session: &CheckoutSessionData,
    ) -> Result<WebhookOutcome, BillingError> {
        if session.payment_status.as_deref().is_some_and(|s| s != "paid") {
            info!(session_id = %session.session_id, "Featured demo checkout not paid yet");
            return Ok(WebhookOutcome::Ignored);
        }

        let demo_id = session
            .metadata
            .get("demo_id")
            .and_then(|id| DemoId::parse(id).ok())
            .ok_or_else(|| BillingError::WebhookError("checkout without demo_id".to_string()))?;

        let until = Utc::now() + Duration::days(FEATURED_DEMO_DAYS);
        match self.repos.demos.set_featured(demo_id, true, Some(until)).await? {
            Some(_) => {
                info!(demo_id = %demo_id, "Demo featured");
                Ok(WebhookOutcome::Applied)
            }
            None => {
                warn!(demo_id = %demo_id, "Paid featured checkout for unknown demo");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    async fn on_subscription_changed(
        &self,
        sub: &SubscriptionData,
        deleted: bool,
        at: DateTime<Utc>,
    ) -> Result<WebhookOutcome, BillingError> {
        let status = if deleted {
            SubscriptionStatus::Canceled
        } else {
            match SubscriptionStatus::from_stripe(&sub.status) {
                Some(status) => status,
                None => {
                    info!(
                        subscription_id = %sub.subscription_id,
                        stripe_status = %sub.status,
                        "Subscription not settled yet"
                    );
                    return Ok(WebhookOutcome::Ignored);
                }
            }
        };

        let Some(user) = self
            .resolve_user(&sub.metadata, Some(&sub.customer_id))
            .await?
        else {
            return Ok(WebhookOutcome::Ignored);
        };
        let plan = sub
            .price_id
            .as_deref()
            .and_then(|price| self.config.plan_for_price(price))
            .or_else(|| sub.metadata.get("plan").and_then(|p| p.parse().ok()));

        let change = SubscriptionChange {
            status: Some(status),
            plan,
            events_quota: plan.map(|p| p.events_quota()),
            reset_usage: false,
            stripe_subscription_id: Some(sub.subscription_id.clone()),
            stripe_event_at: Some(at),
        };
        if !self.apply_change(&user, change).await? {
            return Ok(WebhookOutcome::Ignored);
        }

        info!(user_id = %user.id, status = %status, "Subscription updated");
        Ok(WebhookOutcome::Applied)
    }

    async fn on_invoice(
        &self,
        invoice: &InvoiceData,
        paid: bool,
        at: DateTime<Utc>,
    ) -> Result<WebhookOutcome, BillingError> {
        if invoice.subscription_id.is_none() {
            // One-time payments (featured demos) have no subscription period
            return Ok(WebhookOutcome::Ignored);
        }
        let Some(user) = self
            .resolve_user(&HashMap::new(), Some(&invoice.customer_id))
            .await?
        else {
            return Ok(WebhookOutcome::Ignored);
        };

        let change = if paid {
            SubscriptionChange::reset_usage()
        } else {
            SubscriptionChange::status(SubscriptionStatus::PastDue)
        };
        if !self.apply_change(&user, change.at(at)).await? {
            return Ok(WebhookOutcome::Ignored);
        }

        info!(user_id = %user.id, invoice_id = %invoice.invoice_id, paid, "Invoice applied");
        Ok(WebhookOutcome::Applied)
    }

    /// Apply a Stripe-driven change. False when a newer Stripe event has
    /// already been applied to the user.
    async fn apply_change(
        &self,
        user: &UserRow,
        change: SubscriptionChange,
    ) -> Result<bool, BillingError> {
        let at = change.stripe_event_at;
        let applied = self
            .repos
            .users
            .apply_subscription_change(user.user_id(), change)
            .await?
            .is_some();
        if !applied {
            info!(user_id = %user.id, event_at = ?at, "Stale Stripe event skipped");
        }
        Ok(applied)
    }

    /// Find the user an event belongs to: `metadata.user_id` first, then the
    /// Stripe customer.
    async fn resolve_user(
        &self,
        metadata: &HashMap<String, String>,
        customer_id: Option<&str>,
    ) -> Result<Option<UserRow>, BillingError> {
        if let Some(user_id) = metadata.get("user_id").and_then(|id| UserId::parse(id).ok()) {
            if let Some(user) = self.repos.users.find_by_id(user_id).await? {
                return Ok(Some(user));
            }
        }
        if let Some(customer_id) = customer_id {
            if let Some(user) = self.repos.users.find_by_stripe_customer_id(customer_id).await? {
                return Ok(Some(user));
            }
        }
        warn!(customer_id = ?customer_id, "Webhook for unknown user");
        Ok(None)
    }
}

fn required(value: &str, field: &str, max: usize) -> Result<String, BillingError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BillingError::InvalidInput(format!("{field} is required")));
    }
    if trimmed.len() > max {
        return Err(BillingError::InvalidInput(format!(
            "{field} too long (max {max} chars)"
        )));
    }
    Ok(trimmed.to_string())
}
