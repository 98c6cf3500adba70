use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// The authenticated identity and bearer credential used for remote calls.
///
/// Field names on the wire match what the auth service returns from its
/// `login` mutation, so the same shape is used for durable storage.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token sent with every CRM request.
    #[serde(rename = "token")]
    pub access_token: String,
    /// Refresh token. Stored but not used: there is no refresh flow.
    #[serde(rename = "refreshToken", default)]
    pub refresh_token: String,
    /// Identifier of the signed-in user.
    #[serde(rename = "userId", default, deserialize_with = "string_or_number")]
    pub user_id: String,
    /// Human-readable name, resolved lazily after login.
    #[serde(rename = "userName", default, skip_serializing_if = "Option::is_none")]
    pub user_display_name: Option<String>,
    /// Access token expiry as returned by the auth service.
    #[serde(rename = "exp", default, deserialize_with = "string_or_number")]
    pub access_token_expiry: String,
    /// Refresh token expiry as returned by the auth service.
    #[serde(rename = "expRefresh", default, deserialize_with = "string_or_number")]
    pub refresh_token_expiry: String,
}

impl Session {
    /// Returns the user id if it is present and non-blank.
    pub fn resolvable_user_id(&self) -> Option<&str> {
        let id = self.user_id.trim();
        (!id.is_empty()).then_some(id)
    }

    /// Returns `true` if the access token expiry lies before `now`.
    ///
    /// Returns `false` when the expiry cannot be interpreted.
    pub fn access_token_expired(&self, now: DateTime<Utc>) -> bool {
        parse_expiry(&self.access_token_expiry).is_some_and(|exp| exp <= now)
    }

    /// Returns a copy with the display name set.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.user_display_name = Some(name.into());
        self
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .field("user_display_name", &self.user_display_name)
            .field("access_token_expiry", &self.access_token_expiry)
            .field("refresh_token_expiry", &self.refresh_token_expiry)
            .finish()
    }
}

/// Accept a string, a number or `null` where the auth service is loose about
/// types.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Null => String::new(),
        other => {
            return Err(serde::de::Error::custom(format!(
                "expected string or number, got {other}"
            )));
        }
    })
}

/// Interpret an expiry value as RFC 3339 or as Unix seconds / milliseconds.
fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let n: i64 = raw.parse().ok()?;
    // Anything past the year 33658 in seconds is taken to be milliseconds.
    if n > 999_999_999_999 {
        Utc.timestamp_millis_opt(n).single()
    } else {
        Utc.timestamp_opt(n, 0).single()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(exp: &str) -> Session {
        Session {
            access_token: "secret-token".into(),
            refresh_token: "secret-refresh".into(),
            user_id: "user-1".into(),
            user_display_name: None,
            access_token_expiry: exp.into(),
            refresh_token_expiry: String::new(),
        }
    }

    #[test]
    fn deserializes_login_payload_shape() {
        let json = r#"{
            "token":"t","exp":"1700000000","userId":"u-9",
            "refreshToken":"r","expRefresh":"1800000000"
        }"#;
        let s: Session = serde_json::from_str(json).unwrap();
        assert_eq!(s.access_token, "t");
        assert_eq!(s.user_id, "u-9");
        assert_eq!(s.refresh_token, "r");
        assert!(s.user_display_name.is_none());

        let back = serde_json::to_value(&s).unwrap();
        assert_eq!(back["token"], "t");
        assert!(back.get("userName").is_none());
    }

    #[test]
    fn numeric_ids_and_expiries_are_accepted() {
        let json =
            r#"{"token":"t","exp":1700000000,"userId":42,"refreshToken":"r","expRefresh":null}"#;
        let s: Session = serde_json::from_str(json).unwrap();
        assert_eq!(s.user_id, "42");
        assert_eq!(s.access_token_expiry, "1700000000");
        assert_eq!(s.refresh_token_expiry, "");
    }

    #[test]
    fn debug_redacts_tokens() {
        let rendered = format!("{:?}", session(""));
        assert!(!rendered.contains("secret-token"));
        assert!(!rendered.contains("secret-refresh"));
        assert!(rendered.contains("user-1"));
    }

    #[test]
    fn blank_user_id_is_not_resolvable() {
        let mut s = session("");
        assert_eq!(s.resolvable_user_id(), Some("user-1"));
        s.user_id = "   ".into();
        assert_eq!(s.resolvable_user_id(), None);
    }

    #[test]
    fn expiry_accepts_seconds_millis_and_rfc3339() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert!(session("1699999999").access_token_expired(now));
        assert!(!session("1700000001").access_token_expired(now));
        assert!(session("1699999999000").access_token_expired(now));
        assert!(!session("2030-01-01T00:00:00Z").access_token_expired(now));
        assert!(!session("not a date").access_token_expired(now));
        assert!(!session("").access_token_expired(now));
    }
}
