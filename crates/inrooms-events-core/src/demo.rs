//! Demo registration, recordings and promotion

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};

use inrooms_db::{CreateDemo, Repositories};
use inrooms_types::{Demo, DemoId, DemoRegistration, RecordingVisibility, UserId};

use crate::error::{admitted, record_attempt, AdmissionError};
use crate::validate;

/// New demo input
#[derive(Debug, Clone)]
pub struct NewDemo {
    pub host_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub max_participants: i32,
}

/// A stored recording and the window it was granted
#[derive(Debug, Clone)]
pub struct RecordingUpload {
    pub demo: Demo,
    pub visibility: RecordingVisibility,
}

/// Demo service
#[derive(Clone)]
pub struct DemoService {
    repos: Repositories,
}

impl DemoService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    #[instrument(skip(self, input), fields(host_id = %input.host_id))]
    pub async fn create_demo(&self, input: NewDemo) -> Result<Demo, AdmissionError> {
        validate::title(&input.title)?;
        validate::capacity(input.max_participants)?;

        if self.repos.users.find_by_id(input.host_id).await?.is_none() {
            return Err(AdmissionError::UserNotFound);
        }

        let row = self
            .repos
            .demos
            .create(CreateDemo {
                id: DemoId::new(),
                host_id: input.host_id,
                title: input.title.trim().to_string(),
                description: input.description,
                scheduled_at: input.scheduled_at,
                max_participants: input.max_participants,
            })
            .await?;

        Ok(row.into())
    }

    pub async fn get_demo(&self, demo_id: DemoId) -> Result<Demo, AdmissionError> {
        self.repos
            .demos
            .find_by_id(demo_id)
            .await?
            .map(Demo::from)
            .ok_or(AdmissionError::DemoNotFound)
    }

    /// Register for a demo. Consumes the same per-user quota as events.
    #[instrument(skip(self))]
    pub async fn register_for_demo(
        &self,
        user_id: UserId,
        demo_id: DemoId,
    ) -> Result<DemoRegistration, AdmissionError> {
        let result = async {
            let outcome = self
                .repos
                .demos
                .register_user(user_id, demo_id, Utc::now())
                .await?;
            let admitted = admitted(outcome, AdmissionError::DemoNotFound)?;
            let quota = admitted.quota.unwrap_or_default();

            Ok(DemoRegistration {
                demo_id,
                events_used: quota.used,
                events_quota: quota.quota,
                current_participants: admitted.current,
            })
        }
        .await;

        record_attempt("demo", &result);
        result
    }

    /// Cancel a registration and free the seat. The consumed quota stays
    /// consumed for the period.
    #[instrument(skip(self))]
    pub async fn cancel_demo_registration(
        &self,
        user_id: UserId,
        demo_id: DemoId,
    ) -> Result<(), AdmissionError> {
        if self.repos.demos.find_by_id(demo_id).await?.is_none() {
            return Err(AdmissionError::DemoNotFound);
        }
        if !self
            .repos
            .demos
            .cancel_registration(user_id, demo_id)
            .await?
        {
            return Err(AdmissionError::NotRegistered);
        }

        info!("Demo registration canceled");
        Ok(())
    }

    /// Attach a recording. The visibility window is clamped against the
    /// host's authoritative subscription.
    #[instrument(skip(self, recording_url))]
    pub async fn upload_recording(
        &self,
        host_id: UserId,
        demo_id: DemoId,
        recording_url: &str,
        visibility_days: i64,
    ) -> Result<RecordingUpload, AdmissionError> {
        validate::recording_url(recording_url)?;

        let demo = self.get_demo(demo_id).await?;
        if demo.host_id != host_id {
            warn!("Recording upload by non-host rejected");
            return Err(AdmissionError::NotHost);
        }

        let host = self
            .repos
            .users
            .find_by_id(host_id)
            .await?
            .ok_or(AdmissionError::UserNotFound)?
            .subscription()?;

        let visibility = RecordingVisibility::grant(&host, visibility_days, Utc::now());
        if visibility.was_clamped() {
            info!(
                requested = visibility.requested_days,
                granted = visibility.granted_days,
                "Recording visibility clamped"
            );
        }

        let row = self
            .repos
            .demos
            .set_recording(demo_id, recording_url, visibility.visible_until)
            .await?
            .ok_or(AdmissionError::DemoNotFound)?;

        Ok(RecordingUpload {
            demo: row.into(),
            visibility,
        })
    }

    /// Promote or demote a demo. `days` bounds the promotion; `None` means
    /// until turned off.
    #[instrument(skip(self))]
    pub async fn set_featured(
        &self,
        demo_id: DemoId,
        featured: bool,
        days: Option<i64>,
    ) -> Result<Demo, AdmissionError> {
        if let Some(d) = days {
            validate::featured_days(d)?;
        }
        let until = if featured {
            days.map(|d| Utc::now() + Duration::days(d))
        } else {
            None
        };

        let row = self
            .repos
            .demos
            .set_featured(demo_id, featured, until)
            .await?
            .ok_or(AdmissionError::DemoNotFound)?;

        info!(featured, "Demo featured flag updated");
        Ok(row.into())
    }
}
