use bytes::Bytes;
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::profiles::schema::CANDIDATE_ARRAY_FIELDS;
use crate::state::AppState;
use crate::uploads::classifier::{bucket_for, field_for_filename, Bucket};

pub struct UploadItem {
    pub filename: String,
    pub content_type: String,
    pub body: Bytes,
}

/// Classify a batch of files, store each under
/// `{user_id}/{timestamp}-{index}-{filename}` in the bucket its content type
/// demands, and return the profile-field to URL mapping for the caller to
/// merge into an onboarding or update payload. Single-valued document fields
/// take the last matching URL; array-valued fields accumulate every match in
/// the batch. Nothing is written to the profile store here.
#[instrument(skip(state, files), fields(count = files.len()))]
pub async fn classify_and_store(
    state: &AppState,
    user_id: Uuid,
    files: Vec<UploadItem>,
) -> Result<Map<String, Value>, ApiError> {
    let mut mapped = Map::new();
    let stamp = OffsetDateTime::now_utc().unix_timestamp();

    for (index, file) in files.into_iter().enumerate() {
        let bucket = match bucket_for(&file.content_type) {
            Some(Bucket::Documents) => &state.config.storage.documents_bucket,
            Some(Bucket::Avatars) => &state.config.storage.avatars_bucket,
            None => {
                return Err(ApiError::UnsupportedFileType {
                    filename: file.filename,
                    content_type: file.content_type,
                })
            }
        };

        // Timestamp plus batch index keeps paths collision-free within a batch.
        let path = format!("{user_id}/{stamp}-{index}-{}", file.filename);
        let url = state
            .storage
            .put(bucket, &path, file.body, &file.content_type)
            .await
            .map_err(|e| ApiError::Upstream {
                collaborator: "object storage",
                source: e.context(format!("upload {}", file.filename)),
            })?;

        match field_for_filename(&file.filename) {
            Some(field) if CANDIDATE_ARRAY_FIELDS.contains(&field) => {
                let entry = mapped
                    .entry(field.to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(urls) = entry {
                    urls.push(Value::String(url));
                }
                info!(user_id = %user_id, filename = %file.filename, field, "file classified");
            }
            Some(field) => {
                mapped.insert(field.to_string(), Value::String(url));
                info!(user_id = %user_id, filename = %file.filename, field, "file classified");
            }
            None => {
                debug!(user_id = %user_id, filename = %file.filename, "no rule matched; url discarded");
            }
        }
    }

    Ok(mapped)
}
