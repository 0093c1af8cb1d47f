use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;

/// Image hosting collaborator; the store only keeps the returned URL.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<String, AppError>;
}

/// Returns deterministic fake URLs without storing anything.
#[derive(Debug, Default)]
pub struct InMemoryImageStore;

#[async_trait]
impl ImageStore for InMemoryImageStore {
    async fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<String, AppError> {
        if bytes.is_empty() {
            return Err(AppError::BadRequest("empty image upload".to_string()));
        }

        Ok(format!("https://img.local/{}/{file_name}", Uuid::new_v4()))
    }
}
