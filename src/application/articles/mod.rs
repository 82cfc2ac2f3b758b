//! Published articles: cached reads, query shapes and the write path.

mod commands;
mod query;
mod service;

pub use commands::{ArticleCommands, CreateArticleInput, UpdateArticleInput};
pub use query::{ArticleFilters, FilterField, QueryError, SortField, SortOrder, SortSpec};
pub use service::{ArticleService, METRIC_CACHE_WARM_MS, WarmSummary};
