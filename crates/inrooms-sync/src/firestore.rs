//! Firestore REST client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, instrument};

use crate::document::Fields;
use crate::store::DocumentStore;
use crate::SyncError;

const FIRESTORE_API_BASE: &str = "https://firestore.googleapis.com";

/// Firestore connection settings
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    /// OAuth2 access token for a service account with datastore write access
    pub access_token: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl FirestoreConfig {
    pub fn new(project_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            access_token: access_token.into(),
            base_url: FIRESTORE_API_BASE.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Point at an emulator or test server
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct DocumentBody<'a> {
    fields: &'a Fields,
}

/// Firestore client
#[derive(Clone)]
pub struct FirestoreClient {
    client: Client,
    config: FirestoreConfig,
}

impl FirestoreClient {
    pub fn new(config: FirestoreConfig) -> Result<Self, SyncError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!(
            "{}/v1/projects/{}/databases/(default)/documents/{}/{}",
            self.config.base_url, self.config.project_id, collection, id
        )
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    #[instrument(skip(self, fields, mask))]
    async fn merge_document(
        &self,
        collection: &str,
        id: &str,
        fields: &Fields,
        mask: &[&str],
    ) -> Result<(), SyncError> {
        let query: Vec<(&str, &str)> = mask
            .iter()
            .map(|path| ("updateMask.fieldPaths", *path))
            .collect();

        let response = self
            .client
            .patch(self.document_url(collection, id))
            .bearer_auth(&self.config.access_token)
            .query(&query)
            .json(&DocumentBody { fields })
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Firestore request failed");
                SyncError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!(status = %status, body = %message, "Firestore API error");
            return Err(SyncError::Firestore {
                status: status.as_u16(),
                message,
            });
        }

        debug!("Document written");
        Ok(())
    }
}
