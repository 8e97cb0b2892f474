//! Firestore document encoding
//!
//! Firestore's REST API wraps every value in a single-key object naming its
//! type (`{"integerValue": "3"}`, `{"mapValue": {"fields": {...}}}`). An
//! externally tagged serde enum produces exactly that shape.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use inrooms_db::UserRow;

use crate::SyncError;

/// Document fields keyed by name
pub type Fields = BTreeMap<String, FieldValue>;

/// A typed Firestore value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldValue {
    NullValue(()),
    BooleanValue(bool),
    /// int64 travels as a JSON string
    IntegerValue(#[serde(with = "int_string")] i64),
    DoubleValue(f64),
    StringValue(String),
    TimestampValue(DateTime<Utc>),
    MapValue(MapValue),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default)]
    pub fields: Fields,
}

impl FieldValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self::StringValue(value.into())
    }

    pub fn map(fields: Fields) -> Self {
        Self::MapValue(MapValue { fields })
    }

    pub fn timestamp_or_null(value: Option<DateTime<Utc>>) -> Self {
        value.map_or(Self::NullValue(()), Self::TimestampValue)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::StringValue(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::IntegerValue(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Fields> {
        match self {
            Self::MapValue(m) => Some(&m.fields),
            _ => None,
        }
    }
}

mod int_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Str(String),
            Num(i64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Str(s) => s.parse().map_err(de::Error::custom),
            Repr::Num(n) => Ok(n),
        }
    }
}

/// The server-owned slice of `users/{firebase_uid}`.
///
/// Only the paths in [`UserDocument::FIELD_MASK`] are written, so profile and
/// onboarding fields owned by the client app survive every sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDocument {
    pub firebase_uid: String,
    pub status: String,
    pub plan: String,
    pub events_quota: i32,
    pub events_used: i32,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub role: String,
    pub sync_version: i64,
    pub synced_at: DateTime<Utc>,
}

impl UserDocument {
    pub const FIELD_MASK: &'static [&'static str] =
        &["subscription", "role", "syncVersion", "syncedAt"];

    /// Build the document for a user row. Fails for users without a
    /// Firebase identity.
    pub fn from_row(row: &UserRow, now: DateTime<Utc>) -> Result<Self, SyncError> {
        let firebase_uid = row.firebase_uid.clone().ok_or(SyncError::NotLinked)?;
        let subscription = row.subscription()?;

        Ok(Self {
            firebase_uid,
            status: subscription.status.as_str().to_string(),
            plan: subscription.plan.as_str().to_string(),
            events_quota: subscription.events_quota,
            events_used: subscription.events_used,
            trial_ends_at: subscription.trial_ends_at,
            role: subscription.role.as_str().to_string(),
            sync_version: row.sync_version,
            synced_at: now,
        })
    }

    pub fn fields(&self) -> Fields {
        let subscription = Fields::from([
            ("status".to_string(), FieldValue::string(&self.status)),
            ("plan".to_string(), FieldValue::string(&self.plan)),
            (
                "eventsQuota".to_string(),
                FieldValue::IntegerValue(self.events_quota.into()),
            ),
            (
                "eventsUsed".to_string(),
                FieldValue::IntegerValue(self.events_used.into()),
            ),
            (
                "trialEndsAt".to_string(),
                FieldValue::timestamp_or_null(self.trial_ends_at),
            ),
        ]);

        Fields::from([
            ("subscription".to_string(), FieldValue::map(subscription)),
            ("role".to_string(), FieldValue::string(&self.role)),
            (
                "syncVersion".to_string(),
                FieldValue::IntegerValue(self.sync_version),
            ),
            (
                "syncedAt".to_string(),
                FieldValue::TimestampValue(self.synced_at),
            ),
        ])
    }
}
