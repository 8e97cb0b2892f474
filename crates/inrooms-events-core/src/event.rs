//! Event registration service

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use inrooms_db::{CreateEvent, Repositories};
use inrooms_types::{
    AdmissionCheck, Event, EventId, RegistrationReceipt, SubscriptionSnapshot, UserId,
};

use crate::error::{admitted, record_attempt, AdmissionError};
use crate::validate;

/// New event input
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub host_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub max_attendees: i32,
}

/// Event service
///
/// `can_register_for_event` is an advisory read used to render the register
/// button. `register_for_event` is the authoritative commit and re-checks
/// everything atomically, so the two can disagree under concurrency and the
/// commit wins.
#[derive(Clone)]
pub struct EventService {
    repos: Repositories,
}

impl EventService {
    /// Create a new event service
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    #[instrument(skip(self, input), fields(host_id = %input.host_id))]
    pub async fn create_event(&self, input: NewEvent) -> Result<Event, AdmissionError> {
        validate::title(&input.title)?;
        validate::capacity(input.max_attendees)?;

        if self.repos.users.find_by_id(input.host_id).await?.is_none() {
            return Err(AdmissionError::UserNotFound);
        }

        let row = self
            .repos
            .events
            .create(CreateEvent {
                id: EventId::new(),
                host_id: input.host_id,
                title: input.title.trim().to_string(),
                description: input.description,
                starts_at: input.starts_at,
                max_attendees: input.max_attendees,
            })
            .await?;

        info!(event_id = %row.id, "Event created");
        Ok(row.into())
    }

    pub async fn get_event(&self, event_id: EventId) -> Result<Event, AdmissionError> {
        self.repos
            .events
            .find_by_id(event_id)
            .await?
            .map(Event::from)
            .ok_or(AdmissionError::EventNotFound)
    }

    /// Current subscription and quota from the authoritative store
    pub async fn get_user_subscription(
        &self,
        user_id: UserId,
    ) -> Result<SubscriptionSnapshot, AdmissionError> {
        let user = self
            .repos
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AdmissionError::UserNotFound)?;

        Ok(user.subscription()?)
    }

    /// Advisory admission check.
    ///
    /// Refusals come back as `success: false` with a readable message; only
    /// storage failures are errors.
    #[instrument(skip(self))]
    pub async fn can_register_for_event(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<AdmissionCheck, AdmissionError> {
        match self.evaluate(user_id, event_id, Utc::now()).await {
            Ok(()) => Ok(AdmissionCheck::allowed()),
            Err(AdmissionError::Database(e)) => Err(AdmissionError::Database(e)),
            Err(denied) => {
                debug!(reason = %denied, "Admission check refused");
                Ok(AdmissionCheck::denied(denied.to_string()))
            }
        }
    }

    async fn evaluate(
        &self,
        user_id: UserId,
        event_id: EventId,
        now: DateTime<Utc>,
    ) -> Result<(), AdmissionError> {
        let user = self
            .repos
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AdmissionError::UserNotFound)?;
        let event = self.get_event(event_id).await?;

        if self.repos.events.is_registered(user_id, event_id).await? {
            return Err(AdmissionError::AlreadyRegistered);
        }

        let subscription = user.subscription()?;
        if !subscription.is_active_at(now) {
            return Err(AdmissionError::SubscriptionInactive);
        }
        if subscription.quota_exhausted() {
            return Err(AdmissionError::QuotaExceeded {
                used: subscription.events_used,
                quota: subscription.events_quota,
            });
        }
        if event.is_full() {
            return Err(AdmissionError::CapacityReached {
                current: event.current_attendees,
                max: event.max_attendees,
            });
        }

        Ok(())
    }

    /// Authoritative registration: records the registration, consumes one
    /// unit of quota and takes a seat, all or nothing.
    #[instrument(skip(self))]
    pub async fn register_for_event(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<RegistrationReceipt, AdmissionError> {
        let result = self.commit(user_id, event_id).await;
        record_attempt("event", &result);

        if let Ok(receipt) = &result {
            info!(
                events_used = receipt.events_used,
                events_quota = receipt.events_quota,
                attendees = receipt.current_attendees,
                "Registered for event"
            );
        }
        result
    }

    async fn commit(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<RegistrationReceipt, AdmissionError> {
        let outcome = self
            .repos
            .events
            .register_user(user_id, event_id, Utc::now())
            .await?;
        let admitted = admitted(outcome, AdmissionError::EventNotFound)?;
        let quota = admitted.quota.unwrap_or_default();

        Ok(RegistrationReceipt {
            event_id,
            events_used: quota.used,
            events_quota: quota.quota,
            current_attendees: admitted.current,
        })
    }

    /// Event IDs the user is registered for
    pub async fn get_user_registrations(
        &self,
        user_id: UserId,
    ) -> Result<Vec<EventId>, AdmissionError> {
        Ok(self.repos.events.registrations_for_user(user_id).await?)
    }
}
