use crate::{error::RecordError, pagination::cursor::Cursor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable extraction progress.
///
/// `page_number` is the next page to fetch and `cursor` the token that fetches
/// it. Only the driver mutates this, and only after a page was handed to the
/// sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionState {
    pub page_number: u64,
    pub cursor: Cursor,
    pub last_saved_at: Option<DateTime<Utc>>,
}

impl Default for ExtractionState {
    fn default() -> Self {
        Self::fresh()
    }
}

impl ExtractionState {
    /// State for a job with no prior checkpoint.
    pub fn fresh() -> Self {
        Self {
            page_number: 1,
            cursor: Cursor::Start,
            last_saved_at: None,
        }
    }

    pub fn new(page_number: u64, cursor: Cursor) -> Self {
        Self {
            page_number: page_number.max(1),
            cursor,
            last_saved_at: None,
        }
    }

    /// Moves past the page that was just written.
    pub fn advance(&mut self, next_cursor: Option<&str>) {
        self.page_number += 1;
        self.cursor = next_cursor.map(Cursor::from_token).unwrap_or_default();
    }

    /// True once the last page was written: past page one with no cursor
    /// left to follow.
    pub fn is_complete(&self) -> bool {
        self.page_number > 1 && self.cursor.is_start()
    }

    pub fn mark_saved(&mut self, at: DateTime<Utc>) {
        self.last_saved_at = Some(at);
    }

    pub fn to_record(&self) -> CheckpointRecord {
        CheckpointRecord {
            after: self.cursor.clone(),
            page_number: self.page_number,
            saved_at: self.last_saved_at,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, RecordError> {
        Ok(serde_json::to_vec(&self.to_record())?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, RecordError> {
        let record: CheckpointRecord = serde_json::from_slice(bytes)?;
        Self::try_from(record)
    }
}

/// On-disk checkpoint format: `{"after": "...", "page_number": N}`.
///
/// `saved_at` is written for auditing and optional on read.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CheckpointRecord {
    pub after: Cursor,
    pub page_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl TryFrom<CheckpointRecord> for ExtractionState {
    type Error = RecordError;

    fn try_from(record: CheckpointRecord) -> Result<Self, Self::Error> {
        if record.page_number == 0 {
            return Err(RecordError::InvalidPageNumber(record.page_number));
        }

        Ok(Self {
            page_number: record.page_number,
            cursor: record.after,
            last_saved_at: record.saved_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_starts_at_page_one() {
        let state = ExtractionState::fresh();
        assert_eq!(state.page_number, 1);
        assert!(state.cursor.is_start());
        assert!(state.last_saved_at.is_none());
    }

    #[test]
    fn advance_moves_page_and_cursor() {
        let mut state = ExtractionState::fresh();
        state.advance(Some("c2"));
        assert_eq!(state.page_number, 2);
        assert_eq!(state.cursor, Cursor::After("c2".into()));

        assert!(!state.is_complete());

        state.advance(None);
        assert_eq!(state.page_number, 3);
        assert!(state.cursor.is_start());
        assert!(state.is_complete());
    }

    #[test]
    fn record_uses_after_and_page_number_keys() {
        let state = ExtractionState::new(4, Cursor::After("MTAx".into()));
        let json: serde_json::Value = serde_json::from_slice(&state.to_json().unwrap()).unwrap();

        assert_eq!(json["after"], "MTAx");
        assert_eq!(json["page_number"], 4);
        assert!(json.get("saved_at").is_none());
    }

    #[test]
    fn reads_records_without_timestamp() {
        let state = ExtractionState::from_json(br#"{"after":"abc","page_number":7}"#).unwrap();
        assert_eq!(state.page_number, 7);
        assert_eq!(state.cursor.as_token(), "abc");
    }

    #[test]
    fn rejects_page_zero() {
        let err = ExtractionState::from_json(br#"{"after":"","page_number":0}"#).unwrap_err();
        assert!(matches!(err, RecordError::InvalidPageNumber(0)));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            ExtractionState::from_json(b"{not json"),
            Err(RecordError::Malformed(_))
        ));
    }
}
