//! Error taxonomy for interactive requests.
//!
//! Module errors are folded into [`ServiceError`] at the service boundary. The
//! UI only ever sees [`ServiceError::user_message`]; the full error goes to the
//! log.
use crate::action::ActionError;
use crate::cache::CacheError;
use crate::catalog::CatalogError;
use crate::pagination::PaginationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Catalog or notifier unreachable; retrying later may work.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Missing title, chapter, watchlist row or cache entry.
    #[error("Not found: {0}")]
    NotFound(NotFoundKind),

    /// Malformed identifiers or bounds.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Store failure.
    #[error("Persistence failure: {0:#}")]
    Persistence(#[from] anyhow::Error),
}

/// What could not be found, used to pick the explanatory message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFoundKind {
    Title(String),
    Chapter(String),
    WatchlistEntry { title_id: String },
    ExpiredResults,
}

impl std::fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotFoundKind::Title(id) => write!(f, "title {}", id),
            NotFoundKind::Chapter(title_id) => write!(f, "chapters of {}", title_id),
            NotFoundKind::WatchlistEntry { title_id } => {
                write!(f, "watchlist entry for {}", title_id)
            }
            NotFoundKind::ExpiredResults => write!(f, "expired search result"),
        }
    }
}

impl ServiceError {
    /// Short message safe to show to the user.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Transient(_) => {
                "The catalog is not responding right now. Please try again in a moment.".to_string()
            }
            ServiceError::NotFound(NotFoundKind::Title(_)) => {
                "That title could not be found in the catalog.".to_string()
            }
            ServiceError::NotFound(NotFoundKind::Chapter(_)) => {
                "That title has no chapters yet.".to_string()
            }
            ServiceError::NotFound(NotFoundKind::WatchlistEntry { .. }) => {
                "That title is not on your watchlist.".to_string()
            }
            ServiceError::NotFound(NotFoundKind::ExpiredResults) => {
                "These results have expired. Please search again.".to_string()
            }
            ServiceError::Validation(reason) => format!("Invalid request: {}.", reason),
            ServiceError::Persistence(_) => {
                "Something went wrong on our side. Please try again later.".to_string()
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Transient(_))
    }
}

impl From<CatalogError> for ServiceError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(what) => ServiceError::NotFound(NotFoundKind::Title(what)),
            CatalogError::NoChapters(title_id) => {
                ServiceError::NotFound(NotFoundKind::Chapter(title_id))
            }
            CatalogError::InvalidQuery(reason) => ServiceError::Validation(reason),
            other => ServiceError::Transient(other.to_string()),
        }
    }
}

impl From<CacheError> for ServiceError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Expired => ServiceError::NotFound(NotFoundKind::ExpiredResults),
            CacheError::Malformed(id) => ServiceError::Validation(format!("unknown result {}", id)),
        }
    }
}

impl From<PaginationError> for ServiceError {
    fn from(err: PaginationError) -> Self {
        ServiceError::Validation(err.to_string().to_lowercase())
    }
}

impl From<ActionError> for ServiceError {
    fn from(err: ActionError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}
