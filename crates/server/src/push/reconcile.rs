//! Finalizing multipart sessions from client completion reports.
//!
//! A client that uploaded parts reports each PUT as `{url, etag}`. The URL is
//! the one this server issued, so it already names the session (`uploadId`),
//! the part (`partNumber`) and, through its path, the object key. Nothing is
//! remembered between rounds.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use futures::{StreamExt, TryStreamExt, stream};
use silo_core::{CompletionRecord, MAX_PART_NUMBER};
use silo_storage::{CompletedPart, ObjectStore, PART_NUMBER_PARAM, StorageError, UPLOAD_ID_PARAM};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use tracing::instrument;
use url::Url;

/// Where one uploaded part belongs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartLocator {
    pub upload_id: String,
    pub part_number: u32,
}

impl PartLocator {
    /// Read the session id and part number from an issued part URL.
    ///
    /// Returns `Ok(None)` for URLs without a session id, which belong to
    /// whole-object uploads and need no completion step.
    pub fn parse(url: &Url) -> ApiResult<Option<Self>> {
        let mut upload_id = None;
        let mut part_number = None;
        for (name, value) in url.query_pairs() {
            if name == UPLOAD_ID_PARAM {
                upload_id = Some(value.into_owned());
            } else if name == PART_NUMBER_PARAM {
                part_number = Some(value.into_owned());
            }
        }

        let Some(upload_id) = upload_id.filter(|id| !id.is_empty()) else {
            return Ok(None);
        };
        let raw = part_number.ok_or_else(|| ApiError::missing(PART_NUMBER_PARAM))?;
        let part_number = raw
            .parse::<u32>()
            .ok()
            .filter(|n| (1..=MAX_PART_NUMBER).contains(n))
            .ok_or_else(|| {
                ApiError::invalid(
                    PART_NUMBER_PARAM,
                    Some(&raw),
                    format!("must be an integer between 1 and {MAX_PART_NUMBER}"),
                )
            })?;

        Ok(Some(Self {
            upload_id,
            part_number,
        }))
    }
}

/// Everything reported for one multipart session.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SessionParts {
    /// Object key the session writes.
    pub key: String,
    /// Part number to ETag.
    pub parts: BTreeMap<u32, String>,
}

impl SessionParts {
    fn completed_parts(&self) -> Vec<CompletedPart> {
        self.parts
            .iter()
            .map(|(&part_number, etag)| CompletedPart {
                part_number,
                etag: etag.clone(),
            })
            .collect()
    }
}

/// Validate completion records and group them by session id.
///
/// Records are accepted in any order; within a session the parts come out
/// sorted. The same part reported twice with one ETag counts once.
pub fn group_completions(
    store: &dyn ObjectStore,
    records: &[CompletionRecord],
) -> ApiResult<BTreeMap<String, SessionParts>> {
    let mut sessions: BTreeMap<String, SessionParts> = BTreeMap::new();

    for record in records {
        let url = Url::parse(&record.url)
            .map_err(|e| ApiError::invalid("url", Some(&record.url), e.to_string()))?;
        let Some(locator) = PartLocator::parse(&url)? else {
            continue;
        };
        if record.etag.is_empty() {
            return Err(ApiError::missing("etag"));
        }
        let key = store
            .key_from_url(&url)
            .map_err(|e| ApiError::invalid("url", Some(&record.url), e.to_string()))?;

        let session = match sessions.entry(locator.upload_id.clone()) {
            Entry::Vacant(slot) => slot.insert(SessionParts {
                key,
                parts: BTreeMap::new(),
            }),
            Entry::Occupied(slot) => {
                let session = slot.into_mut();
                if session.key != key {
                    return Err(ApiError::invalid(
                        UPLOAD_ID_PARAM,
                        Some(&locator.upload_id),
                        format!(
                            "parts of one upload point at different objects ({} and {key})",
                            session.key
                        ),
                    ));
                }
                session
            }
        };

        match session.parts.entry(locator.part_number) {
            Entry::Vacant(slot) => {
                slot.insert(record.etag.clone());
            }
            Entry::Occupied(slot) if *slot.get() == record.etag => {}
            Entry::Occupied(_) => {
                return Err(ApiError::invalid(
                    PART_NUMBER_PARAM,
                    Some(&locator.part_number.to_string()),
                    format!(
                        "part reported twice with different etags in upload {}",
                        locator.upload_id
                    ),
                ));
            }
        }
    }

    Ok(sessions)
}

/// Complete every multipart session named in `records`.
///
/// Returns the number of sessions completed. An id the store does not know
/// is a client error; any other store failure propagates.
#[instrument(skip(store, records), fields(records = records.len()))]
pub async fn reconcile_completions(
    store: &dyn ObjectStore,
    records: &[CompletionRecord],
    concurrency: usize,
) -> ApiResult<usize> {
    let sessions = group_completions(store, records)?;
    let count = sessions.len();

    let completions: Vec<_> = sessions
        .iter()
        .map(|(upload_id, session)| complete_session(store, upload_id, session))
        .collect();
    stream::iter(completions)
        .buffer_unordered(concurrency.max(1))
        .try_collect::<Vec<()>>()
        .await?;

    Ok(count)
}

/// Complete one multipart session, mapping an unknown id to a client error.
async fn complete_session(
    store: &dyn ObjectStore,
    upload_id: &str,
    session: &SessionParts,
) -> ApiResult<()> {
    let parts = session.completed_parts();
    match store
        .complete_multipart(&session.key, upload_id, &parts)
        .await
    {
        Ok(()) => {
            metrics::MULTIPART_SESSIONS_COMPLETED.inc();
            tracing::debug!(
                upload_id = %upload_id,
                key = %session.key,
                parts = parts.len(),
                "multipart session completed"
            );
            Ok(())
        }
        Err(StorageError::UploadNotFound(_)) => Err(ApiError::invalid(
            UPLOAD_ID_PARAM,
            Some(upload_id),
            "unknown uploadId",
        )),
        Err(e) => Err(ApiError::from(e)),
    }
}
