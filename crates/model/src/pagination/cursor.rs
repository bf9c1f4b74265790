use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Represents the pagination cursor.
///
/// The token is opaque: it is whatever the source API handed back as the
/// continuation marker for the next page. It must never embed credentials,
/// only the minimal token needed to rebuild the next request from trusted
/// base parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Cursor {
    /// No cursor yet; the first page of the stream.
    #[default]
    Start,

    /// Continue after the given token.
    After(String),
}

impl Cursor {
    /// Builds a cursor from a raw token. An empty token means "start".
    pub fn from_token(token: impl Into<String>) -> Self {
        let token = token.into();
        if token.is_empty() {
            Cursor::Start
        } else {
            Cursor::After(token)
        }
    }

    /// The raw token, `""` for [`Cursor::Start`].
    pub fn as_token(&self) -> &str {
        match self {
            Cursor::Start => "",
            Cursor::After(token) => token,
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(self, Cursor::Start)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Start => f.write_str("<start>"),
            Cursor::After(token) => f.write_str(token),
        }
    }
}

impl From<Option<String>> for Cursor {
    fn from(token: Option<String>) -> Self {
        token.map(Cursor::from_token).unwrap_or_default()
    }
}

// Cursors travel as plain strings in the checkpoint file.
impl Serialize for Cursor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_token())
    }
}

impl<'de> Deserialize<'de> for Cursor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Ok(Cursor::from_token(token))
    }
}
