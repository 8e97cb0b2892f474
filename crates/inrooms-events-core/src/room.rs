//! Live room membership

use tracing::instrument;

use inrooms_db::{CreateRoom, Repositories};
use inrooms_types::{Room, RoomId, RoomMembership, UserId};

use crate::error::{admitted, record_attempt, AdmissionError};
use crate::validate;

/// Room service. Rooms have a seat limit but do not consume quota.
#[derive(Clone)]
pub struct RoomService {
    repos: Repositories,
}

impl RoomService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn create_room(
        &self,
        host_id: UserId,
        name: &str,
        max_participants: i32,
    ) -> Result<Room, AdmissionError> {
        validate::title(name)?;
        validate::capacity(max_participants)?;

        if self.repos.users.find_by_id(host_id).await?.is_none() {
            return Err(AdmissionError::UserNotFound);
        }

        let row = self
            .repos
            .rooms
            .create(CreateRoom {
                id: RoomId::new(),
                host_id,
                name: name.trim().to_string(),
                max_participants,
            })
            .await?;

        Ok(row.into())
    }

    pub async fn get_room(&self, room_id: RoomId) -> Result<Room, AdmissionError> {
        self.repos
            .rooms
            .find_by_id(room_id)
            .await?
            .map(Room::from)
            .ok_or(AdmissionError::RoomNotFound)
    }

    #[instrument(skip(self))]
    pub async fn join_room(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<RoomMembership, AdmissionError> {
        let result = async {
            let outcome = self.repos.rooms.join(user_id, room_id).await?;
            let admitted = admitted(outcome, AdmissionError::RoomNotFound)?;
            Ok(RoomMembership {
                room_id,
                current_participants: admitted.current,
                max_participants: admitted.max,
            })
        }
        .await;

        record_attempt("room", &result);
        result
    }

    #[instrument(skip(self))]
    pub async fn leave_room(&self, user_id: UserId, room_id: RoomId) -> Result<(), AdmissionError> {
        if self.repos.rooms.find_by_id(room_id).await?.is_none() {
            return Err(AdmissionError::RoomNotFound);
        }
        if !self.repos.rooms.leave(user_id, room_id).await? {
            return Err(AdmissionError::NotRegistered);
        }
        Ok(())
    }
}
