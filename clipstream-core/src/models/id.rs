use nanoid::nanoid;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Generate a 12-character nanoid for entity IDs
pub fn generate_id() -> String {
    nanoid!(12)
}

/// User ID type (opaque external identity, carried in the connection path)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    #[must_use]
    pub fn new() -> Self {
        Self(generate_id())
    }

    #[must_use]
    pub const fn from_string(id: String) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Maximum accepted length for a video id
pub const MAX_VIDEO_ID_LEN: usize = 128;

/// Video ID type (nanoid for generated ids, validated for caller-supplied ones)
///
/// Video ids become file names under the upload directory, so construction
/// goes through [`VideoId::parse`], which only accepts
/// `[A-Za-z0-9_-]{1,128}`. There is no unchecked `From<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    #[must_use]
    pub fn new() -> Self {
        Self(generate_id())
    }

    /// Validate a caller-supplied id.
    ///
    /// The id is interpolated into a file name, so anything outside the
    /// allowed alphabet (path separators, dots, whitespace) is rejected.
    pub fn parse(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::InvalidObjectId("id must not be empty".to_string()));
        }
        if id.len() > MAX_VIDEO_ID_LEN {
            return Err(Error::InvalidObjectId(format!(
                "id exceeds {MAX_VIDEO_ID_LEN} characters"
            )));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::InvalidObjectId(
                "id may only contain letters, digits, '_' and '-'".to_string(),
            ));
        }
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
