//! Gmail label types
//!
//! Provides a strongly-typed enum for Gmail labels instead of raw
//! strings. System labels like INBOX and UNREAD have dedicated
//! variants. User-created labels use the `Custom` variant, which
//! carries the label id (e.g. `Label_12`).

use std::fmt;

/// A Gmail label id.
///
/// # Examples
///
/// ```
/// use gmail_mark_read::Label;
///
/// assert_eq!(Label::Unread.as_str(), "UNREAD");
/// assert_eq!(Label::from("inbox"), Label::Inbox);
/// assert_eq!(Label::custom("Label_7").as_str(), "Label_7");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    /// Messages in the inbox.
    Inbox,
    /// The unread marker; removing it marks a message as read.
    Unread,
    Starred,
    Important,
    Sent,
    Draft,
    Spam,
    Trash,
    /// A user-defined label, by id.
    Custom(String),
}

impl Label {
    #[must_use]
    pub fn custom(id: impl Into<String>) -> Self {
        Self::Custom(id.into())
    }

    /// The label id as sent to the Gmail API.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Inbox => "INBOX",
            Self::Unread => "UNREAD",
            Self::Starred => "STARRED",
            Self::Important => "IMPORTANT",
            Self::Sent => "SENT",
            Self::Draft => "DRAFT",
            Self::Spam => "SPAM",
            Self::Trash => "TRASH",
            Self::Custom(id) => id,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Label {
    /// System label ids are matched case-insensitively; anything else
    /// is kept verbatim as a custom label id.
    fn from(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "INBOX" => Self::Inbox,
            "UNREAD" => Self::Unread,
            "STARRED" => Self::Starred,
            "IMPORTANT" => Self::Important,
            "SENT" => Self::Sent,
            "DRAFT" => Self::Draft,
            "SPAM" => Self::Spam,
            "TRASH" => Self::Trash,
            _ => Self::Custom(s.to_string()),
        }
    }
}

impl From<String> for Label {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl serde::Serialize for Label {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
