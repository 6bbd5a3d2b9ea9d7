mod csv_format;
pub mod error;
pub mod export;
pub mod extract;
pub mod filter;
pub mod graphql;
pub mod record;
pub mod store;
pub mod timing;

pub use error::{Error, Result};
pub use export::{ExportOptions, Exporter};
pub use extract::{FilterProfile, extract, extract_at};
pub use filter::{HostFilter, HostPattern};
pub use graphql::GraphqlInfo;
pub use record::{NetworkRecord, Rating, RequestInfo, ResourceType, ResponseInfo, WebVitalRecord};
pub use store::{ReportCategory, ReportInfo, ReportStore};
pub use timing::TimingTracker;
