//! Typed UI actions carried in component identifiers.
//!
//! Buttons on the chat platform carry a short string identifier that comes back
//! when the user clicks. [`UiAction::encode`] produces that string and
//! [`UiAction::decode`] turns it back into a typed action, once, at the UI
//! boundary.
use crate::cache::ResultId;
use thiserror::Error;

/// Platform limit on component identifier length.
pub const MAX_ENCODED_LEN: usize = 100;

const DELIMITER: char = ':';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("unknown action '{0}'")]
    UnknownTag(String),
    #[error("action '{tag}' is missing field '{field}'")]
    MissingField { tag: &'static str, field: &'static str },
    #[error("action '{tag}' has an invalid {field}")]
    InvalidField { tag: &'static str, field: &'static str },
    #[error("identifier '{0}' is empty or contains ':'")]
    InvalidIdentifier(String),
    #[error("encoded action exceeds {} characters", MAX_ENCODED_LEN)]
    TooLong,
}

/// Every interaction the UI can send back to the core.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    Subscribe { result: ResultId },
    Unsubscribe { title_id: String },
    SearchPage { page: u32, query: String },
    WatchlistPage { page: u32 },
    ListUnread { title_id: String },
    MarkRead { title_id: String, chapter_id: String, chapter_number: f64 },
    MarkLatest { title_id: String },
}

impl UiAction {
    fn tag(&self) -> &'static str {
        match self {
            UiAction::Subscribe { .. } => "sub",
            UiAction::Unsubscribe { .. } => "unsub",
            UiAction::SearchPage { .. } => "search",
            UiAction::WatchlistPage { .. } => "wl",
            UiAction::ListUnread { .. } => "unread",
            UiAction::MarkRead { .. } => "read",
            UiAction::MarkLatest { .. } => "latest",
        }
    }

    /// Encode for use as a component identifier.
    ///
    /// # Errors
    ///
    /// [`ActionError::InvalidIdentifier`] if an id is empty or contains the
    /// delimiter; [`ActionError::TooLong`] if the result exceeds
    /// [`MAX_ENCODED_LEN`] (long search queries).
    pub fn encode(&self) -> Result<String, ActionError> {
        let tag = self.tag();
        let encoded = match self {
            UiAction::Subscribe { result } => format!("{tag}:{result}"),
            UiAction::Unsubscribe { title_id }
            | UiAction::ListUnread { title_id }
            | UiAction::MarkLatest { title_id } => {
                format!("{tag}:{}", check_identifier(title_id)?)
            }
            // Free text goes last so it may contain the delimiter
            UiAction::SearchPage { page, query } => format!("{tag}:{page}:{query}"),
            UiAction::WatchlistPage { page } => format!("{tag}:{page}"),
            UiAction::MarkRead {
                title_id,
                chapter_id,
                chapter_number,
            } => format!(
                "{tag}:{}:{}:{chapter_number}",
                check_identifier(title_id)?,
                check_identifier(chapter_id)?
            ),
        };
        if encoded.chars().count() > MAX_ENCODED_LEN {
            return Err(ActionError::TooLong);
        }
        Ok(encoded)
    }

    /// Decode a component identifier.
    pub fn decode(raw: &str) -> Result<Self, ActionError> {
        if raw.chars().count() > MAX_ENCODED_LEN {
            return Err(ActionError::TooLong);
        }
        let (tag, rest) = raw.split_once(DELIMITER).unwrap_or((raw, ""));
        match tag {
            "sub" => {
                let field = required("sub", "result", rest)?;
                let result = field.parse().map_err(|_| ActionError::InvalidField {
                    tag: "sub",
                    field: "result",
                })?;
                Ok(UiAction::Subscribe { result })
            }
            "unsub" => Ok(UiAction::Unsubscribe {
                title_id: identifier("unsub", "title", rest)?,
            }),
            "unread" => Ok(UiAction::ListUnread {
                title_id: identifier("unread", "title", rest)?,
            }),
            "latest" => Ok(UiAction::MarkLatest {
                title_id: identifier("latest", "title", rest)?,
            }),
            "wl" => Ok(UiAction::WatchlistPage {
                page: page_number("wl", rest)?,
            }),
            "search" => {
                let (page, query) = rest.split_once(DELIMITER).ok_or(ActionError::MissingField {
                    tag: "search",
                    field: "query",
                })?;
                let query = required("search", "query", query)?;
                Ok(UiAction::SearchPage {
                    page: page_number("search", page)?,
                    query: query.to_string(),
                })
            }
            "read" => {
                let mut fields = rest.splitn(3, DELIMITER);
                let title_id = identifier("read", "title", fields.next().unwrap_or(""))?;
                let chapter_id = identifier("read", "chapter", fields.next().unwrap_or(""))?;
                let number = required("read", "number", fields.next().unwrap_or(""))?;
                let chapter_number = number
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite() && *n >= 0.0)
                    .ok_or(ActionError::InvalidField {
                        tag: "read",
                        field: "number",
                    })?;
                Ok(UiAction::MarkRead {
                    title_id,
                    chapter_id,
                    chapter_number,
                })
            }
            other => Err(ActionError::UnknownTag(other.to_string())),
        }
    }
}

fn check_identifier(id: &str) -> Result<&str, ActionError> {
    if id.is_empty() || id.contains(DELIMITER) {
        return Err(ActionError::InvalidIdentifier(id.to_string()));
    }
    Ok(id)
}

fn required<'a>(
    tag: &'static str,
    field: &'static str,
    value: &'a str,
) -> Result<&'a str, ActionError> {
    if value.is_empty() {
        return Err(ActionError::MissingField { tag, field });
    }
    Ok(value)
}

fn identifier(tag: &'static str, field: &'static str, value: &str) -> Result<String, ActionError> {
    let value = required(tag, field, value)?;
    check_identifier(value).map(str::to_string)
}

fn page_number(tag: &'static str, value: &str) -> Result<u32, ActionError> {
    required(tag, "page", value)?
        .parse()
        .map_err(|_| ActionError::InvalidField { tag, field: "page" })
}
