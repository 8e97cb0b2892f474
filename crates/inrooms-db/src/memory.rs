//! In-memory repositories for testing
//!
//! Registration state lives behind a single mutex so every registration is
//! all-or-nothing, like the Postgres transactions. Webhook and quote logs
//! are independent and use `DashMap`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use inrooms_types::{
    DemoId, EventId, Plan, Role, RoomId, SubscriptionStatus, UserId, TRIAL_DAYS,
    TRIAL_EVENTS_QUOTA,
};

use crate::error::DbResult;
use crate::models::*;
use crate::repo::*;

#[derive(Default)]
struct State {
    users: HashMap<Uuid, UserRow>,
    events: HashMap<Uuid, EventRow>,
    demos: HashMap<Uuid, DemoRow>,
    rooms: HashMap<Uuid, RoomRow>,
    // Insertion order doubles as registration order
    event_registrations: Vec<(Uuid, Uuid)>,
    demo_registrations: Vec<(Uuid, Uuid)>,
    room_participants: Vec<(Uuid, Uuid)>,
}

impl State {
    fn quota_available(&self, user_id: Uuid, now: DateTime<Utc>) -> bool {
        self.users.get(&user_id).is_some_and(|u| {
            u.admits_registration(now) && (u.is_admin() || u.events_used < u.events_quota)
        })
    }

    /// Guarded quota consumption, same predicate as the SQL update
    fn consume_quota(
        &mut self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<QuotaUsage, RegistrationOutcome> {
        let user = self
            .users
            .get_mut(&user_id)
            .ok_or(RegistrationOutcome::UserNotFound)?;

        if !user.admits_registration(now) {
            return Err(RegistrationOutcome::SubscriptionInactive);
        }
        if !user.is_admin() && user.events_used >= user.events_quota {
            return Err(RegistrationOutcome::quota_denial(user, now));
        }

        user.events_used += 1;
        mark_dirty(user);
        Ok(QuotaUsage {
            used: user.events_used,
            quota: user.events_quota,
        })
    }
}

fn mark_dirty(user: &mut UserRow) {
    user.needs_firebase_sync = true;
    user.sync_version += 1;
    user.sync_attempts = 0;
    user.last_sync_error = None;
    user.updated_at = Utc::now();
}

/// In-memory store implementing every repository trait
#[derive(Default, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    webhook_events: Arc<DashMap<String, String>>,
    quotes: Arc<DashMap<Uuid, QuoteRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bundle this store as `Repositories`
    pub fn repositories(&self) -> Repositories {
        Repositories {
            users: Arc::new(self.clone()),
            events: Arc::new(self.clone()),
            demos: Arc::new(self.clone()),
            rooms: Arc::new(self.clone()),
            webhook_events: Arc::new(self.clone()),
            quotes: Arc::new(self.clone()),
            health: Arc::new(self.clone()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a test user directly
    pub fn insert_user(&self, user: UserRow) {
        self.lock().users.insert(user.id, user);
    }

    /// Snapshot of a stored user
    pub fn user(&self, id: UserId) -> Option<UserRow> {
        self.lock().users.get(&id.0).cloned()
    }

    /// Overwrite a user's counters directly, marking the row dirty
    pub fn set_usage(&self, id: UserId, used: i32, quota: i32) {
        if let Some(user) = self.lock().users.get_mut(&id.0) {
            user.events_used = used;
            user.events_quota = quota;
            mark_dirty(user);
        }
    }

    /// Create a test user with the given subscription state
    pub fn test_user(status: SubscriptionStatus, plan: Plan, used: i32, quota: i32) -> UserRow {
        let now = Utc::now();
        UserRow {
            id: Uuid::new_v4(),
            firebase_uid: Some(format!("fb-{}", Uuid::new_v4().simple())),
            email: format!("test-{}@example.com", Uuid::new_v4()),
            display_name: None,
            role: Role::User.as_str().to_string(),
            subscription_status: status.as_str().to_string(),
            subscription_plan: plan.as_str().to_string(),
            events_quota: quota,
            events_used: used,
            trial_ends_at: (status == SubscriptionStatus::Trial)
                .then(|| now + Duration::days(TRIAL_DAYS)),
            stripe_customer_id: None,
            stripe_subscription_id: None,
            needs_firebase_sync: false,
            sync_version: 1,
            sync_attempts: 0,
            last_sync_error: None,
            last_synced_at: None,
            stripe_event_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A fresh trial user as signup creates them
    pub fn trial_user() -> UserRow {
        Self::test_user(
            SubscriptionStatus::Trial,
            Plan::Starter,
            0,
            TRIAL_EVENTS_QUOTA,
        )
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_id(&self, id: UserId) -> DbResult<Option<UserRow>> {
        Ok(self.user(id))
    }

    async fn find_by_firebase_uid(&self, uid: &str) -> DbResult<Option<UserRow>> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.firebase_uid.as_deref() == Some(uid))
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<UserRow>> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_stripe_customer_id(&self, customer_id: &str) -> DbResult<Option<UserRow>> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.stripe_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn create(&self, user: CreateUser) -> DbResult<UserRow> {
        let now = Utc::now();
        let row = UserRow {
            id: user.id.0,
            firebase_uid: user.firebase_uid,
            email: user.email,
            display_name: user.display_name,
            role: user.role.as_str().to_string(),
            subscription_status: user.status.as_str().to_string(),
            subscription_plan: user.plan.as_str().to_string(),
            events_quota: user.events_quota,
            events_used: 0,
            trial_ends_at: user.trial_ends_at,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            needs_firebase_sync: true,
            sync_version: 1,
            sync_attempts: 0,
            last_sync_error: None,
            last_synced_at: None,
            stripe_event_at: None,
            created_at: now,
            updated_at: now,
        };
        self.insert_user(row.clone());
        Ok(row)
    }

    async fn link_firebase_uid(
        &self,
        id: UserId,
        uid: &str,
        display_name: Option<&str>,
    ) -> DbResult<Option<UserRow>> {
        let mut state = self.lock();
        let Some(user) = state.users.get_mut(&id.0) else {
            return Ok(None);
        };
        if user.firebase_uid.as_deref().is_some_and(|linked| linked != uid) {
            return Ok(None);
        }
        user.firebase_uid = Some(uid.to_string());
        if let Some(name) = display_name {
            user.display_name = Some(name.to_string());
        }
        mark_dirty(user);
        Ok(Some(user.clone()))
    }

    async fn set_stripe_customer_id(&self, id: UserId, customer_id: &str) -> DbResult<()> {
        if let Some(user) = self.lock().users.get_mut(&id.0) {
            user.stripe_customer_id = Some(customer_id.to_string());
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn apply_subscription_change(
        &self,
        id: UserId,
        change: SubscriptionChange,
    ) -> DbResult<Option<UserRow>> {
        let mut state = self.lock();
        let Some(user) = state.users.get_mut(&id.0) else {
            return Ok(None);
        };
        if let Some(at) = change.stripe_event_at {
            if user.stripe_event_at.is_some_and(|last| last > at) {
                return Ok(None);
            }
            user.stripe_event_at = Some(at);
        }
        if let Some(status) = change.status {
            user.subscription_status = status.as_str().to_string();
        }
        if let Some(plan) = change.plan {
            user.subscription_plan = plan.as_str().to_string();
        }
        if let Some(quota) = change.events_quota {
            user.events_quota = quota;
        }
        if change.reset_usage {
            user.events_used = 0;
        }
        if let Some(sub_id) = change.stripe_subscription_id {
            user.stripe_subscription_id = Some(sub_id);
        }
        mark_dirty(user);
        Ok(Some(user.clone()))
    }

    async fn find_pending_sync(&self, limit: i64, max_attempts: i32) -> DbResult<Vec<UserRow>> {
        let state = self.lock();
        let mut pending: Vec<UserRow> = state
            .users
            .values()
            .filter(|u| {
                u.needs_firebase_sync && u.firebase_uid.is_some() && u.sync_attempts < max_attempts
            })
            .cloned()
            .collect();
        pending.sort_by_key(|u| u.updated_at);
        pending.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(pending)
    }

    async fn complete_sync(&self, id: UserId, version: i64) -> DbResult<bool> {
        let mut state = self.lock();
        match state.users.get_mut(&id.0) {
            Some(user) if user.sync_version == version => {
                user.needs_firebase_sync = false;
                user.sync_attempts = 0;
                user.last_sync_error = None;
                user.last_synced_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_sync_failure(&self, id: UserId, error: &str) -> DbResult<()> {
        if let Some(user) = self.lock().users.get_mut(&id.0) {
            user.sync_attempts += 1;
            user.last_sync_error = Some(error.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn create(&self, event: CreateEvent) -> DbResult<EventRow> {
        let row = EventRow {
            id: event.id.0,
            host_id: event.host_id.0,
            title: event.title,
            description: event.description,
            starts_at: event.starts_at,
            max_attendees: event.max_attendees,
            current_attendees: 0,
            created_at: Utc::now(),
        };
        self.lock().events.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: EventId) -> DbResult<Option<EventRow>> {
        Ok(self.lock().events.get(&id.0).cloned())
    }

    async fn register_user(
        &self,
        user_id: UserId,
        event_id: EventId,
        now: DateTime<Utc>,
    ) -> DbResult<RegistrationOutcome> {
        let mut state = self.lock();

        if !state.users.contains_key(&user_id.0) {
            return Ok(RegistrationOutcome::UserNotFound);
        }
        let Some(event) = state.events.get(&event_id.0) else {
            return Ok(RegistrationOutcome::TargetNotFound);
        };
        let (current, max) = (event.current_attendees, event.max_attendees);

        let key = (user_id.0, event_id.0);
        if state.event_registrations.contains(&key) {
            return Ok(RegistrationOutcome::AlreadyRegistered);
        }

        // Quota is judged before seats, matching the SQL statement order
        if current >= max && state.quota_available(user_id.0, now) {
            return Ok(RegistrationOutcome::CapacityReached { current, max });
        }

        let quota = match state.consume_quota(user_id.0, now) {
            Ok(quota) => quota,
            Err(denied) => return Ok(denied),
        };

        let Some(event) = state.events.get_mut(&event_id.0) else {
            return Ok(RegistrationOutcome::TargetNotFound);
        };
        event.current_attendees += 1;
        let (current, max) = (event.current_attendees, event.max_attendees);
        state.event_registrations.push(key);

        Ok(RegistrationOutcome::Registered {
            current,
            max,
            quota: Some(quota),
        })
    }

    async fn is_registered(&self, user_id: UserId, event_id: EventId) -> DbResult<bool> {
        Ok(self
            .lock()
            .event_registrations
            .contains(&(user_id.0, event_id.0)))
    }

    async fn registrations_for_user(&self, user_id: UserId) -> DbResult<Vec<EventId>> {
        Ok(self
            .lock()
            .event_registrations
            .iter()
            .rev()
            .filter(|(u, _)| *u == user_id.0)
            .map(|(_, e)| EventId(*e))
            .collect())
    }
}

#[async_trait]
impl DemoRepository for MemoryStore {
    async fn create(&self, demo: CreateDemo) -> DbResult<DemoRow> {
        let row = DemoRow {
            id: demo.id.0,
            host_id: demo.host_id.0,
            title: demo.title,
            description: demo.description,
            scheduled_at: demo.scheduled_at,
            max_participants: demo.max_participants,
            current_participants: 0,
            recording_url: None,
            recording_visible_until: None,
            is_featured: false,
            featured_until: None,
            created_at: Utc::now(),
        };
        self.lock().demos.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: DemoId) -> DbResult<Option<DemoRow>> {
        Ok(self.lock().demos.get(&id.0).cloned())
    }

    async fn register_user(
        &self,
        user_id: UserId,
        demo_id: DemoId,
        now: DateTime<Utc>,
    ) -> DbResult<RegistrationOutcome> {
        let mut state = self.lock();

        if !state.users.contains_key(&user_id.0) {
            return Ok(RegistrationOutcome::UserNotFound);
        }
        let Some(demo) = state.demos.get(&demo_id.0) else {
            return Ok(RegistrationOutcome::TargetNotFound);
        };
        let (current, max) = (demo.current_participants, demo.max_participants);

        let key = (user_id.0, demo_id.0);
        if state.demo_registrations.contains(&key) {
            return Ok(RegistrationOutcome::AlreadyRegistered);
        }

        // Quota is judged before seats, matching the SQL statement order
        if current >= max && state.quota_available(user_id.0, now) {
            return Ok(RegistrationOutcome::CapacityReached { current, max });
        }

        let quota = match state.consume_quota(user_id.0, now) {
            Ok(quota) => quota,
            Err(denied) => return Ok(denied),
        };

        let Some(demo) = state.demos.get_mut(&demo_id.0) else {
            return Ok(RegistrationOutcome::TargetNotFound);
        };
        demo.current_participants += 1;
        let (current, max) = (demo.current_participants, demo.max_participants);
        state.demo_registrations.push(key);

        Ok(RegistrationOutcome::Registered {
            current,
            max,
            quota: Some(quota),
        })
    }

    async fn cancel_registration(&self, user_id: UserId, demo_id: DemoId) -> DbResult<bool> {
        let mut state = self.lock();
        let key = (user_id.0, demo_id.0);
        let Some(pos) = state.demo_registrations.iter().position(|k| *k == key) else {
            return Ok(false);
        };
        state.demo_registrations.remove(pos);
        if let Some(demo) = state.demos.get_mut(&demo_id.0) {
            demo.current_participants = (demo.current_participants - 1).max(0);
        }
        Ok(true)
    }

    async fn set_recording(
        &self,
        id: DemoId,
        recording_url: &str,
        visible_until: DateTime<Utc>,
    ) -> DbResult<Option<DemoRow>> {
        let mut state = self.lock();
        Ok(state.demos.get_mut(&id.0).map(|demo| {
            demo.recording_url = Some(recording_url.to_string());
            demo.recording_visible_until = Some(visible_until);
            demo.clone()
        }))
    }

    async fn set_featured(
        &self,
        id: DemoId,
        featured: bool,
        featured_until: Option<DateTime<Utc>>,
    ) -> DbResult<Option<DemoRow>> {
        let mut state = self.lock();
        Ok(state.demos.get_mut(&id.0).map(|demo| {
            demo.is_featured = featured;
            demo.featured_until = featured_until;
            demo.clone()
        }))
    }
}

#[async_trait]
impl RoomRepository for MemoryStore {
    async fn create(&self, room: CreateRoom) -> DbResult<RoomRow> {
        let row = RoomRow {
            id: room.id.0,
            host_id: room.host_id.0,
            name: room.name,
            max_participants: room.max_participants,
            current_participants: 0,
            created_at: Utc::now(),
        };
        self.lock().rooms.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: RoomId) -> DbResult<Option<RoomRow>> {
        Ok(self.lock().rooms.get(&id.0).cloned())
    }

    async fn join(&self, user_id: UserId, room_id: RoomId) -> DbResult<RegistrationOutcome> {
        let mut state = self.lock();

        if !state.users.contains_key(&user_id.0) {
            return Ok(RegistrationOutcome::UserNotFound);
        }
        let key = (user_id.0, room_id.0);
        let already = state.room_participants.contains(&key);
        let Some(room) = state.rooms.get_mut(&room_id.0) else {
            return Ok(RegistrationOutcome::TargetNotFound);
        };
        if already {
            return Ok(RegistrationOutcome::AlreadyRegistered);
        }
        if room.current_participants >= room.max_participants {
            return Ok(RegistrationOutcome::CapacityReached {
                current: room.current_participants,
                max: room.max_participants,
            });
        }
        room.current_participants += 1;
        let (current, max) = (room.current_participants, room.max_participants);
        state.room_participants.push(key);

        Ok(RegistrationOutcome::Registered {
            current,
            max,
            quota: None,
        })
    }

    async fn leave(&self, user_id: UserId, room_id: RoomId) -> DbResult<bool> {
        let mut state = self.lock();
        let key = (user_id.0, room_id.0);
        let Some(pos) = state.room_participants.iter().position(|k| *k == key) else {
            return Ok(false);
        };
        state.room_participants.remove(pos);
        if let Some(room) = state.rooms.get_mut(&room_id.0) {
            room.current_participants = (room.current_participants - 1).max(0);
        }
        Ok(true)
    }
}

#[async_trait]
impl WebhookEventRepository for MemoryStore {
    async fn claim(&self, event_id: &str, event_type: &str) -> DbResult<bool> {
        match self.webhook_events.entry(event_id.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(event_type.to_string());
                Ok(true)
            }
        }
    }

    async fn release(&self, event_id: &str) -> DbResult<()> {
        self.webhook_events.remove(event_id);
        Ok(())
    }
}

#[async_trait]
impl QuoteRepository for MemoryStore {
    async fn create(&self, quote: CreateQuote) -> DbResult<QuoteRow> {
        let row = QuoteRow {
            id: Uuid::new_v4(),
            name: quote.name,
            email: quote.email,
            company: quote.company,
            team_size: quote.team_size,
            message: quote.message,
            status: "new".to_string(),
            created_at: Utc::now(),
        };
        self.quotes.insert(row.id, row.clone());
        Ok(row)
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> DbResult<()> {
        Ok(())
    }
}
