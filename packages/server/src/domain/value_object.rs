//! Value objects
//!
//! 識別子はすべて UUID をラップします。パース時に不正な文字列と nil UUID を拒否するため、
//! 一度構築された値は常に有効です。

use std::fmt;

use serde::Serialize;
use tayori_shared::time::timestamp_to_rfc3339;
use uuid::Uuid;

use super::error::ValidationError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse an identifier supplied in the wire field `field`.
            ///
            /// # Errors
            ///
            /// Returns [`ValidationError::InvalidId`] if `raw` is not a UUID or is the nil UUID.
            pub fn parse(field: &'static str, raw: &str) -> Result<Self, ValidationError> {
                match Uuid::parse_str(raw.trim()) {
                    Ok(uuid) if !uuid.is_nil() => Ok(Self(uuid)),
                    _ => Err(ValidationError::InvalidId {
                        field,
                        value: raw.to_string(),
                    }),
                }
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// Identity of an authenticated user.
    UserId
);
uuid_id!(
    /// Identity of a chat (private or group).
    ChatId
);
uuid_id!(
    /// Identity of a persisted message.
    MessageId
);
uuid_id!(
    /// Identity of one live connection. A reconnecting user gets a new one.
    ConnectionId
);

/// Unix timestamp in UTC (milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(millis: i64) -> Self {
        Self(millis)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn to_rfc3339(&self) -> String {
        timestamp_to_rfc3339(self.0)
    }
}
