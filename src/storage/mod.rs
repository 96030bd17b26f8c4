mod baselines;
mod schema;
mod types;
mod watchlist;

pub use schema::Database;
pub use types::{
    DatabaseError, NotificationBaseline, ProgressUpdate, SubscribeOutcome, WatchlistEntry,
};
