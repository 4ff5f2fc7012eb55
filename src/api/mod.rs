mod client;
mod normalize;
mod request;
mod token;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ApiClient, ApiError};
pub use normalize::{collapse, record, records, usage};
pub use token::{bind, binding_for, Operation, TokenBinding, TokenManager, EMPTY_TOKEN_FAULT};
pub use types::{
    AccessToken, CategoryHandle, Credentials, Direction, OrderBy, OrderField, Record,
    ReportHandle, SectionHandle, TimeRangeHandle, UsageAggregate, UsageSeries, REFERENCE_TIMEZONE,
};
