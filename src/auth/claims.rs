use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Payload of every token this service issues. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

impl Claims {
    pub fn issue(sub: i64, kind: TokenKind, iss: &str, aud: &str, ttl: Duration) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            sub,
            iat: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
            iss: iss.to_owned(),
            aud: aud.to_owned(),
            kind,
        }
    }
}
