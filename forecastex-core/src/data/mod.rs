//! Data acquisition, caching and the settlement merge

pub mod acquire;
pub mod cache;
pub mod forecastex;
pub mod merge;
pub mod provider;
pub mod range;
pub mod table;

pub use acquire::{
    acquire_day, acquire_range, classify_response, AcquireOptions, AcquireProgress,
    AcquireSummary, Classification, DayOutcome, LogProgress, SilentProgress,
};
pub use cache::{CacheEntry, Coverage, DayCache};
pub use forecastex::ForecastExSource;
pub use merge::{
    collect_days, filter_day, find_price_column, merge_cache, FilteredDay, MergeOptions,
    MergeOutcome, MergeSummary, SkippedFile,
};
pub use provider::{DataError, FetchResponse, PriceSource};
pub use range::{date_label, parse_date_label, DateRange};
pub use table::{DayTable, TableError};
