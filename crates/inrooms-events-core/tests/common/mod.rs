//! Common fixtures for inrooms-events-core integration tests

use chrono::{Duration, Utc};
use inrooms_db::memory::MemoryStore;
use inrooms_db::UserRow;
use inrooms_events_core::{DemoService, EventService, NewDemo, NewEvent, RoomService};
use inrooms_types::{Demo, Event, Plan, SubscriptionStatus, UserId};

/// Services wired to one in-memory store
pub struct Harness {
    pub store: MemoryStore,
    pub events: EventService,
    pub demos: DemoService,
    pub rooms: RoomService,
}

impl Harness {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let repos = store.repositories();
        Self {
            events: EventService::new(repos.clone()),
            demos: DemoService::new(repos.clone()),
            rooms: RoomService::new(repos),
            store,
        }
    }

    pub fn add_user(&self, user: UserRow) -> UserId {
        let id = user.user_id();
        self.store.insert_user(user);
        id
    }

    /// Active professional user with room to spare
    pub fn active_user(&self) -> UserId {
        self.add_user(MemoryStore::test_user(
            SubscriptionStatus::Active,
            Plan::Professional,
            0,
            Plan::Professional.events_quota(),
        ))
    }

    pub async fn event(&self, host: UserId, max_attendees: i32) -> Event {
        self.events
            .create_event(NewEvent {
                host_id: host,
                title: "Weekly standup".into(),
                description: None,
                starts_at: Utc::now() + Duration::days(2),
                max_attendees,
            })
            .await
            .unwrap()
    }

    #[allow(dead_code)]
    pub async fn demo(&self, host: UserId, max_participants: i32) -> Demo {
        self.demos
            .create_demo(NewDemo {
                host_id: host,
                title: "Product walkthrough".into(),
                description: Some("Live demo".into()),
                scheduled_at: Utc::now() + Duration::days(1),
                max_participants,
            })
            .await
            .unwrap()
    }
}
