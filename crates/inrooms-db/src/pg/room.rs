//! PostgreSQL room repository implementation

use async_trait::async_trait;
use sqlx::PgPool;

use inrooms_types::{RoomId, UserId};

use super::admission::{self, Seats};
use crate::error::DbResult;
use crate::models::RoomRow;
use crate::repo::{CreateRoom, RegistrationOutcome, RoomRepository};

/// PostgreSQL room repository
#[derive(Clone)]
pub struct PgRoomRepository {
    pool: PgPool,
}

impl PgRoomRepository {
    /// Create a new room repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomRepository for PgRoomRepository {
    async fn create(&self, room: CreateRoom) -> DbResult<RoomRow> {
        let row = sqlx::query_as::<_, RoomRow>(
            r#"
            INSERT INTO rooms (id, host_id, name, max_participants)
            VALUES ($1, $2, $3, $4)
            RETURNING id, host_id, name, max_participants, current_participants, created_at
            "#,
        )
        .bind(room.id.0)
        .bind(room.host_id.0)
        .bind(&room.name)
        .bind(room.max_participants)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_by_id(&self, id: RoomId) -> DbResult<Option<RoomRow>> {
        let row = sqlx::query_as::<_, RoomRow>(
            r#"
            SELECT id, host_id, name, max_participants, current_participants, created_at
            FROM rooms
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    #[tracing::instrument(skip(self))]
    async fn join(&self, user_id: UserId, room_id: RoomId) -> DbResult<RegistrationOutcome> {
        let mut tx = self.pool.begin().await?;

        if admission::find_user(&mut *tx, user_id.0).await?.is_none() {
            return Ok(RegistrationOutcome::UserNotFound);
        }

        let room: Option<(i32,)> = sqlx::query_as("SELECT max_participants FROM rooms WHERE id = $1")
            .bind(room_id.0)
            .fetch_optional(&mut *tx)
            .await?;
        if room.is_none() {
            return Ok(RegistrationOutcome::TargetNotFound);
        }

        let inserted = sqlx::query(
            "INSERT INTO room_participants (user_id, room_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id.0)
        .bind(room_id.0)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if inserted == 0 {
            return Ok(RegistrationOutcome::AlreadyRegistered);
        }

        let (current, max) = match admission::take_seat(&mut tx, Seats::Room, room_id.0).await? {
            Ok(counts) => counts,
            Err(denied) => {
                tx.rollback().await?;
                return Ok(denied);
            }
        };

        tx.commit().await?;

        Ok(RegistrationOutcome::Registered {
            current,
            max,
            quota: None,
        })
    }

    async fn leave(&self, user_id: UserId, room_id: RoomId) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM room_participants WHERE user_id = $1 AND room_id = $2")
            .bind(user_id.0)
            .bind(room_id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Ok(false);
        }

        admission::release_seat(&mut tx, Seats::Room, room_id.0).await?;
        tx.commit().await?;

        Ok(true)
    }
}
