//! Steps shared by the transactional registration paths.
//!
//! Lock order inside a registration transaction is always: registration
//! row, then `users`, then the capacity row. Keeping that order across
//! events, demos and rooms rules out deadlocks between them.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Postgres, Transaction};
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::UserRow;
use crate::repo::{QuotaUsage, RegistrationOutcome};

pub(crate) type Tx<'a> = Transaction<'a, Postgres>;

pub(crate) async fn find_user(conn: &mut PgConnection, user_id: Uuid) -> DbResult<Option<UserRow>> {
    let user = sqlx::query_as::<_, UserRow>(concat!(
        "SELECT ",
        user_columns!(),
        " FROM users WHERE id = $1"
    ))
    .bind(user_id)
    .fetch_optional(conn)
    .await?;

    Ok(user)
}

/// Consume one unit of quota, or explain why not.
///
/// The guard re-evaluates after waiting on the row lock, so concurrent
/// callers at `events_used = quota - 1` cannot both pass.
pub(crate) async fn consume_quota(
    tx: &mut Tx<'_>,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> DbResult<Result<QuotaUsage, RegistrationOutcome>> {
    let consumed: Option<(i32, i32)> = sqlx::query_as(concat!(
        "UPDATE users SET events_used = events_used + 1, ",
        mark_dirty!(),
        r#"
        WHERE id = $1
          AND (subscription_status = 'active'
               OR (subscription_status = 'trial'
                   AND (trial_ends_at IS NULL OR trial_ends_at > $2)))
          AND (role = 'admin' OR events_used < events_quota)
        RETURNING events_used, events_quota
        "#
    ))
    .bind(user_id)
    .bind(now)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some((used, quota)) = consumed {
        return Ok(Ok(QuotaUsage { used, quota }));
    }

    match find_user(&mut **tx, user_id).await? {
        Some(user) => Ok(Err(RegistrationOutcome::quota_denial(&user, now))),
        None => Ok(Err(RegistrationOutcome::UserNotFound)),
    }
}

/// Guarded seat increment on `table`. Returns `(current, max)` after the
/// increment, or the unchanged counters when the target is full.
pub(crate) async fn take_seat(
    tx: &mut Tx<'_>,
    table: Seats,
    id: Uuid,
) -> DbResult<Result<(i32, i32), RegistrationOutcome>> {
    let taken: Option<(i32, i32)> = sqlx::query_as(table.take_sql())
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

    if let Some(counts) = taken {
        return Ok(Ok(counts));
    }

    let current: Option<(i32, i32)> = sqlx::query_as(table.read_sql())
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

    Ok(Err(match current {
        Some((current, max)) => RegistrationOutcome::CapacityReached { current, max },
        None => RegistrationOutcome::TargetNotFound,
    }))
}

/// Release a seat, never going below zero
pub(crate) async fn release_seat(tx: &mut Tx<'_>, table: Seats, id: Uuid) -> DbResult<()> {
    sqlx::query(table.release_sql())
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Tables with a `current <= max` seat counter
#[derive(Debug, Clone, Copy)]
pub(crate) enum Seats {
    Event,
    Demo,
    Room,
}

impl Seats {
    fn take_sql(self) -> &'static str {
        match self {
            Self::Event => {
                "UPDATE events SET current_attendees = current_attendees + 1 \
                 WHERE id = $1 AND current_attendees < max_attendees \
                 RETURNING current_attendees, max_attendees"
            }
            Self::Demo => {
                "UPDATE demos SET current_participants = current_participants + 1 \
                 WHERE id = $1 AND current_participants < max_participants \
                 RETURNING current_participants, max_participants"
            }
            Self::Room => {
                "UPDATE rooms SET current_participants = current_participants + 1 \
                 WHERE id = $1 AND current_participants < max_participants \
                 RETURNING current_participants, max_participants"
            }
        }
    }

    fn read_sql(self) -> &'static str {
        match self {
            Self::Event => "SELECT current_attendees, max_attendees FROM events WHERE id = $1",
            Self::Demo => {
                "SELECT current_participants, max_participants FROM demos WHERE id = $1"
            }
            Self::Room => {
                "SELECT current_participants, max_participants FROM rooms WHERE id = $1"
            }
        }
    }

    fn release_sql(self) -> &'static str {
        match self {
            Self::Event => {
                "UPDATE events SET current_attendees = GREATEST(current_attendees - 1, 0) \
                 WHERE id = $1"
            }
            Self::Demo => {
                "UPDATE demos SET current_participants = GREATEST(current_participants - 1, 0) \
                 WHERE id = $1"
            }
            Self::Room => {
                "UPDATE rooms SET current_participants = GREATEST(current_participants - 1, 0) \
                 WHERE id = $1"
            }
        }
    }
}
