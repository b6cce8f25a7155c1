//! Message types shared by the guest chat client and server.
//!
//! These are the JSON shapes exchanged over the REST API. Field names are
//! camelCase on the wire.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Maximum allowed message content length in characters.
pub const MAX_CONTENT_LEN: usize = 2000;

/// Minimum allowed display name length in characters.
pub const MIN_NAME_LEN: usize = 3;

/// Maximum allowed display name length in characters.
pub const MAX_NAME_LEN: usize = 50;

/// Prefix used for client-generated placeholder message IDs.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Identifier of a message.
///
/// Server-assigned once persisted. Before confirmation the client uses a
/// placeholder of the form `temp-<millis>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Creates a message identifier from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a temporary placeholder ID for an optimistic message.
    #[must_use]
    pub fn temp(at: Timestamp) -> Self {
        Self(format!("{TEMP_ID_PREFIX}{}", at.as_millis()))
    }

    /// Whether this is a client-side placeholder that the server never saw.
    #[must_use]
    pub fn is_temp(&self) -> bool {
        self.0.starts_with(TEMP_ID_PREFIX)
    }

    /// Returns the string form of this ID.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// UTC timestamp serialized as an RFC 3339 string.
///
/// This is the ordering key for every message and the `since` watermark of
/// incremental fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp for the current instant, truncated to milliseconds.
    #[must_use]
    pub fn now() -> Self {
        Self::from_millis(Utc::now().timestamp_millis())
    }

    /// Creates a timestamp from milliseconds since the UNIX epoch.
    ///
    /// Out-of-range values clamp to the epoch.
    #[must_use]
    pub fn from_millis(millis: i64) -> Self {
        Self(DateTime::from_timestamp_millis(millis).unwrap_or_default())
    }

    /// Parses an RFC 3339 / ISO-8601 timestamp with any offset.
    ///
    /// # Errors
    ///
    /// Returns the `chrono` parse error if the input is not RFC 3339.
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(s).map(|dt| Self(dt.with_timezone(&Utc)))
    }

    /// Returns milliseconds since the UNIX epoch.
    #[must_use]
    pub fn as_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Returns the inner `chrono` datetime.
    #[must_use]
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Returns a timestamp `millis` milliseconds later.
    #[must_use]
    pub fn plus_millis(self, millis: i64) -> Self {
        Self::from_millis(self.as_millis().saturating_add(millis))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl std::str::FromStr for Timestamp {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    /// The anonymous site visitor.
    Guest,
    /// Support staff.
    #[serde(alias = "support")]
    Admin,
}

impl std::fmt::Display for SenderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Guest => write!(f, "guest"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// A chat message as stored by the server and shown by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server-assigned (or temporary) identifier.
    pub id: MessageId,
    /// Trimmed, non-empty text.
    pub content: String,
    /// Author role.
    pub sender_type: SenderType,
    /// Author display name at the time of sending.
    pub sender_name: String,
    /// Creation time; the ordering and de-duplication key.
    pub created_at: Timestamp,
    /// Whether the recipient has read the message.
    #[serde(default)]
    pub read: bool,
}

impl Message {
    /// Whether this message is an unconfirmed optimistic placeholder.
    #[must_use]
    pub fn is_temp(&self) -> bool {
        self.id.is_temp()
    }
}

/// Error returned when user input fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Message content is empty after trimming.
    #[error("message content is empty")]
    EmptyContent,
    /// Message content exceeds the maximum allowed length.
    #[error("message too long ({len} characters, max {max})")]
    ContentTooLong {
        /// Actual length in characters.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },
    /// Display name length outside the allowed range.
    #[error("name must be between {min} and {max} characters (got {len})")]
    NameLength {
        /// Actual length in characters.
        len: usize,
        /// Minimum allowed length.
        min: usize,
        /// Maximum allowed length.
        max: usize,
    },
}

/// Trims and validates message content.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyContent`] for blank input or
/// [`ValidationError::ContentTooLong`] past [`MAX_CONTENT_LEN`] characters.
pub fn validate_content(content: &str) -> Result<&str, ValidationError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyContent);
    }
    let len = trimmed.chars().count();
    if len > MAX_CONTENT_LEN {
        return Err(ValidationError::ContentTooLong {
            len,
            max: MAX_CONTENT_LEN,
        });
    }
    Ok(trimmed)
}

/// Trims and validates a device display name.
///
/// # Errors
///
/// Returns [`ValidationError::NameLength`] unless the trimmed name has
/// between [`MIN_NAME_LEN`] and [`MAX_NAME_LEN`] characters.
pub fn validate_display_name(name: &str) -> Result<&str, ValidationError> {
    let trimmed = name.trim();
    let len = trimmed.chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        return Err(ValidationError::NameLength {
            len,
            min: MIN_NAME_LEN,
            max: MAX_NAME_LEN,
        });
    }
    Ok(trimmed)
}
