//! Note composition.
//!
//! Turns free-text notes, the email being filed and the uploaded files into a
//! single note [`ContentBlock`]. Composition is pure apart from the generated
//! identifier and the caller-supplied timestamp.

use std::fmt::Write as _;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SyncError;
use crate::opportunity::{BlockUser, ContentBlock, NoteData, StoredFile};

/// Block type written for every composed entry.
pub const NOTE_BLOCK_TYPE: &str = "Note";

/// `noteType` written for every composed entry.
pub const GENERAL_NOTE_TYPE: &str = "General";

/// Placeholder used when the email body is empty.
pub const EMPTY_BODY_PLACEHOLDER: &str = "No email content available";

/// Default `strftime` format for the `Date:` line.
pub const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y, %H:%M:%S";

/// Identity of the email's sender.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailSender {
    pub name: String,
    pub address: String,
}

impl EmailSender {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// Sender used when the host cannot supply one.
    pub fn unknown() -> Self {
        Self::new("Unknown", "")
    }
}

/// Everything a note is composed from.
#[derive(Debug, Clone)]
pub struct NoteInput<'a> {
    /// Operator's free-text notes; may be empty.
    pub notes: &'a str,
    pub sender: &'a EmailSender,
    pub subject: &'a str,
    /// Plain-text email body; may be empty.
    pub body: &'a str,
    /// Uploaded files, in selection order.
    pub files: Vec<StoredFile>,
    pub created_by: BlockUser,
}

/// Builds note blocks, rendering the `Date:` line in a fixed timezone.
#[derive(Debug, Clone)]
pub struct NoteComposer {
    timezone: Tz,
    date_format: String,
}

impl Default for NoteComposer {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            date_format: DEFAULT_DATE_FORMAT.to_owned(),
        }
    }
}

impl NoteComposer {
    /// Create a composer for the given timezone and `strftime` format.
    ///
    /// Rejects formats chrono cannot render, including parse-only
    /// specifiers such as `%#z`.
    pub fn new(timezone: Tz, date_format: impl Into<String>) -> Result<Self, SyncError> {
        let date_format = date_format.into();
        let unparsable = StrftimeItems::new(&date_format).any(|item| matches!(item, Item::Error));
        let sample = Utc::now().with_timezone(&timezone);
        if unparsable || render_date(&date_format, &sample).is_none() {
            return Err(SyncError::validation(format!(
                "invalid date format: {date_format}"
            )));
        }
        Ok(Self {
            timezone,
            date_format,
        })
    }

    /// Parse an IANA timezone name (e.g. `"Europe/Berlin"`).
    pub fn parse_timezone(name: &str) -> Result<Tz, SyncError> {
        name.parse::<Tz>()
            .map_err(|_| SyncError::validation(format!("unknown timezone: {name}")))
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Compose a new note block stamped with `now`.
    pub fn compose(&self, input: NoteInput<'_>, now: DateTime<Utc>) -> ContentBlock {
        let comment = self.format_comment(&input, now);

        ContentBlock {
            id: Uuid::new_v4().to_string(),
            kind: NOTE_BLOCK_TYPE.to_owned(),
            data: NoteData {
                note_type: GENERAL_NOTE_TYPE.to_owned(),
                comment,
            },
            files: input.files,
            comments: Vec::new(),
            expanded: false,
            created_date: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            user: input.created_by,
        }
    }

    /// Render the comment text of a note.
    pub fn format_comment(&self, input: &NoteInput<'_>, now: DateTime<Utc>) -> String {
        let mut comment = String::new();

        let notes = input.notes.trim();
        if !notes.is_empty() {
            comment.push_str(notes);
            comment.push_str("\n\n");
        }

        let sender_name = match input.sender.name.trim() {
            "" => "Unknown",
            name => name,
        };
        let local = now.with_timezone(&self.timezone);
        let date = render_date(&self.date_format, &local)
            .or_else(|| render_date(DEFAULT_DATE_FORMAT, &local))
            .unwrap_or_default();
        let body = match input.body.trim() {
            "" => EMPTY_BODY_PLACEHOLDER,
            _ => input.body,
        };

        comment.push_str(&format!(
            "Email from: {sender_name} <{}>\nSubject: {}\nDate: {date}\n\nEmail content:\n{body}",
            input.sender.address, input.subject
        ));

        comment.trim().to_owned()
    }
}

/// Render `date` with `format`, or `None` when chrono cannot format it.
fn render_date(format: &str, date: &DateTime<Tz>) -> Option<String> {
    let mut out = String::new();
    write!(out, "{}", date.format(format)).ok()?;
    Some(out)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 5).unwrap()
    }

    fn user() -> BlockUser {
        BlockUser {
            id: "u-1".into(),
            name: Some("Ada Lovelace".into()),
        }
    }

    fn input<'a>(notes: &'a str, sender: &'a EmailSender, body: &'a str) -> NoteInput<'a> {
        NoteInput {
            notes,
            sender,
            subject: "RE: quote",
            body,
            files: Vec::new(),
            created_by: user(),
        }
    }

    #[test]
    fn comment_lines_appear_in_order() {
        let sender = EmailSender::new("Jane Doe", "jane@x.com");
        let comment = NoteComposer::default().format_comment(
            &input("Called customer", &sender, "Please confirm pricing."),
            now(),
        );

        let expected = [
            "Called customer",
            "Email from: Jane Doe <jane@x.com>",
            "Subject: RE: quote",
            "Date: 19/10/2026, 08:30:05",
            "Email content:",
            "Please confirm pricing.",
        ];
        let mut cursor = 0;
        for needle in expected {
            let pos = comment[cursor..]
                .find(needle)
                .unwrap_or_else(|| panic!("{needle:?} missing or out of order in {comment:?}"));
            cursor += pos + needle.len();
        }
        assert_eq!(comment, comment.trim());
        assert!(comment.starts_with("Called customer\n\nEmail from:"));
        assert!(comment.contains("Date: 19/10/2026, 08:30:05\n\nEmail content:\n"));
    }

    #[test]
    fn empty_notes_and_body() {
        let sender = EmailSender::new("", "anon@x.com");
        let comment = NoteComposer::default().format_comment(&input("  ", &sender, " \n"), now());
        assert!(comment.starts_with("Email from: Unknown <anon@x.com>"));
        assert!(comment.ends_with("Email content:\nNo email content available"));
    }

    #[test]
    fn date_line_uses_configured_timezone() {
        let tz = NoteComposer::parse_timezone("Europe/Berlin").unwrap();
        let composer = NoteComposer::new(tz, "%Y-%m-%d %H:%M").unwrap();
        let sender = EmailSender::new("Jane", "jane@x.com");
        let comment = composer.format_comment(&input("", &sender, "hi"), now());
        assert!(comment.contains("Date: 2026-10-19 10:30"));
    }

    #[test]
    fn rejects_bad_configuration() {
        assert!(NoteComposer::parse_timezone("Mars/Olympus").is_err());
        assert!(NoteComposer::new(Tz::UTC, "%Q broken %").is_err());
        assert!(NoteComposer::new(Tz::UTC, "%#z").is_err());
    }

    #[test]
    fn unformattable_date_falls_back_to_default_format() {
        let composer = NoteComposer {
            timezone: Tz::UTC,
            date_format: "%#z".to_owned(),
        };
        let sender = EmailSender::new("Jane", "jane@x.com");
        let comment = composer.format_comment(&input("", &sender, "hi"), now());
        assert!(comment.contains("Date: 19/10/2026, 08:30:05\n"));
    }

    #[test]
    fn composed_block_shape() {
        let sender = EmailSender::new("Jane Doe", "jane@x.com");
        let mut note = input("n", &sender, "b");
        note.files = vec![StoredFile {
            file_id: "f-1".into(),
            file_name: "a.pdf".into(),
            file_type: None,
            parent_entity_id: Some("opp-1".into()),
            size_bytes: Some(3),
            created_at: None,
            extra: serde_json::Map::new(),
        }];

        let block = NoteComposer::default().compose(note, now());
        assert_eq!(block.kind, "Note");
        assert_eq!(block.data.note_type, "General");
        assert_eq!(block.files.len(), 1);
        assert!(block.comments.is_empty());
        assert!(!block.expanded);
        assert_eq!(block.created_date, "2026-10-19T08:30:05.000Z");
        assert_eq!(block.user, user());
        assert!(Uuid::parse_str(&block.id).is_ok());
    }

    #[test]
    fn identifiers_are_unique() {
        let sender = EmailSender::unknown();
        let composer = NoteComposer::default();
        let a = composer.compose(input("", &sender, ""), now());
        let b = composer.compose(input("", &sender, ""), now());
        assert_ne!(a.id, b.id);
    }
}
