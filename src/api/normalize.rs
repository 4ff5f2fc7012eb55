//! Turns raw payloads into the handful of shapes the client returns.
//!
//! The service encodes sequences as a wrapper holding `item` children, so a
//! list can arrive absent, as an empty wrapper, as a wrapper with one item
//! (an object) or with several (an array). All of these collapse to a `Vec`
//! in service order.

use serde_json::Value;
use tracing::warn;

use super::types::{Record, UsageAggregate, UsageSeries};
use crate::soap::ITEM;

/// Collapses every encoding of a sequence into its items.
pub fn collapse(payload: Value) -> Vec<Value> {
    match payload {
        Value::Object(mut wrapper) => match wrapper.remove(ITEM) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(single) => vec![single],
        },
        Value::Array(items) => items,
        _ => Vec::new(),
    }
}

/// A sequence of records (handles or data rows); non-record items are skipped.
pub fn records<T: From<Record>>(payload: Value) -> Vec<T> {
    collapse(payload)
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(record) => Some(T::from(record)),
            other => {
                warn!(item = %other, "skipping non-record list item");
                None
            }
        })
        .collect()
}

/// A single record; anything but an object yields an empty record.
pub fn record(payload: Value) -> Record {
    match payload {
        Value::Object(record) => record,
        _ => Record::new(),
    }
}

/// A disk or network usage aggregate.
pub fn usage(payload: Value) -> UsageAggregate {
    let mut fields = record(payload);
    let mut scalar = |name: &str| fields.remove(name).filter(|value| !value.is_null());

    let start_time = scalar("startTime");
    let start_time_epoch = scalar("startTimeEpoch");
    let end_time = scalar("endTime");
    let end_time_epoch = scalar("endTimeEpoch");
    let interval = scalar("interval");
    let nsamples = scalar("nsamples");
    let values = scalar("values")
        .map(|values| collapse(values).into_iter().map(series).collect())
        .unwrap_or_default();

    UsageAggregate {
        start_time,
        start_time_epoch,
        end_time,
        end_time_epoch,
        interval,
        nsamples,
        values,
    }
}

fn series(entry: Value) -> UsageSeries {
    let mut fields = record(entry);
    let mut take = |name: &str| fields.remove(name).filter(|value| !value.is_null());

    let kind = take("type");
    let label = take("label");
    let units = take("units");
    let samples = take("samples")
        .map(|samples| collapse(samples).iter().map(sample).collect())
        .unwrap_or_default();

    UsageSeries {
        kind,
        label,
        units,
        samples,
    }
}

/// A missing or unreadable sample keeps its slot as `None`.
fn sample(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Null => return None,
        Value::Number(number) => number.as_f64(),
        Value::String(text) if text.trim().is_empty() => return None,
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    };
    if parsed.is_none() {
        warn!(sample = %value, "non-numeric usage sample");
    }
    parsed
}
