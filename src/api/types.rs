use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// A plain record, e.g. one report data row or the current traffic snapshot.
pub type Record = Map<String, Value>;

/// The user's username and password, in a struct out of ease.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The session credential issued by `getAccess`.
///
/// Its fields are vendor-defined; every one of them is echoed back verbatim
/// on authenticated calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(BTreeMap<String, String>);

impl AccessToken {
    pub fn new(fields: BTreeMap<String, String>) -> Self {
        Self(fields)
    }

    /// Reads a token out of a `getAccess` payload. Scalars are kept as text;
    /// nil or nested fields cannot be echoed back and are dropped with a warning.
    pub fn from_payload(payload: &Value) -> Self {
        let fields = match payload {
            Value::Object(fields) => fields
                .iter()
                .filter_map(|(name, value)| {
                    let text = match value {
                        Value::String(text) => text.clone(),
                        Value::Number(number) => number.to_string(),
                        Value::Bool(flag) => flag.to_string(),
                        Value::Null => {
                            warn!(field = %name, "dropping nil access token field");
                            return None;
                        }
                        Value::Array(_) | Value::Object(_) => {
                            warn!(field = %name, "dropping nested access token field");
                            return None;
                        }
                    };
                    Some((name.clone(), text))
                })
                .collect(),
            _ => BTreeMap::new(),
        };
        Self(fields)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    /// The token as the record placed inside the bound parameter.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(name, value)| (name.clone(), Value::String(value.clone())))
                .collect(),
        )
    }
}

macro_rules! handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Record);

        impl $name {
            /// The handle's `name` field, when the service provides one.
            pub fn name(&self) -> Option<&str> {
                self.0.get("name").and_then(Value::as_str)
            }

            pub fn as_record(&self) -> &Record {
                &self.0
            }

            pub fn to_value(&self) -> Value {
                Value::Object(self.0.clone())
            }
        }

        impl From<Record> for $name {
            fn from(record: Record) -> Self {
                Self(record)
            }
        }
    };
}

handle!(
    /// A report known to the service, as listed by `getAvailableReports`.
    ReportHandle
);
handle!(
    /// A category within a report.
    CategoryHandle
);
handle!(
    /// A time range within a report; see [`TimeRangeHandle::start`].
    TimeRangeHandle
);
handle!(
    /// A network usage section within a report.
    SectionHandle
);

/// The service's reference clock: UTC-7, no daylight saving.
pub const REFERENCE_TIMEZONE: FixedOffset = match FixedOffset::west_opt(7 * 3600) {
    Some(offset) => offset,
    None => panic!("UTC-7 is a valid offset"),
};

impl TimeRangeHandle {
    /// Start of the range, in the service's reference timezone.
    pub fn start(&self) -> Option<DateTime<FixedOffset>> {
        self.epoch_field("start")
    }

    /// End of the range, in the service's reference timezone.
    pub fn end(&self) -> Option<DateTime<FixedOffset>> {
        self.epoch_field("end")
    }

    fn epoch_field(&self, field: &str) -> Option<DateTime<FixedOffset>> {
        let seconds = match self.0.get(field)? {
            Value::Number(number) => number.as_i64()?,
            Value::String(text) => text.trim().parse().ok()?,
            _ => return None,
        };
        REFERENCE_TIMEZONE.timestamp_opt(seconds, 0).single()
    }
}

/// A column report data can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    ItemName,
    NumBytes,
    NumSeconds,
    NumUsers,
    NumRequests,
}

impl OrderField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ItemName => "item_name",
            Self::NumBytes => "num_bytes",
            Self::NumSeconds => "num_seconds",
            Self::NumUsers => "num_users",
            Self::NumRequests => "num_requests",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Renders the ordering string `getReportData` accepts, e.g. `num_bytes desc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: OrderField,
    pub direction: Option<Direction>,
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field.as_str())?;
        if let Some(direction) = self.direction {
            write!(f, " {}", direction.as_str())?;
        }
        Ok(())
    }
}

/// One series inside a usage aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSeries {
    #[serde(rename = "type")]
    pub kind: Option<Value>,
    pub label: Option<Value>,
    pub units: Option<Value>,
    /// One slot per sample the service sent; `None` marks a gap.
    pub samples: Vec<Option<f64>>,
}

/// Result of `getDiskUsage` and `getNetworkUsage`.
///
/// Scalars are copied verbatim from the service; an absent response yields
/// the default (everything unset, no series).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageAggregate {
    pub start_time: Option<Value>,
    pub start_time_epoch: Option<Value>,
    pub end_time: Option<Value>,
    pub end_time_epoch: Option<Value>,
    pub interval: Option<Value>,
    pub nsamples: Option<Value>,
    pub values: Vec<UsageSeries>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::LogBuffer;
    use serde_json::json;

    #[test]
    fn access_token_keeps_every_field_as_text() {
        let token = AccessToken::from_payload(&json!({
            "user": "alice",
            "session": 1234,
            "admin": false,
            "nested": { "ignored": true },
        }));

        assert_eq!(token.get("user"), Some("alice"));
        assert_eq!(token.get("session"), Some("1234"));
        assert_eq!(token.get("admin"), Some("false"));
        assert_eq!(token.get("nested"), None);
        assert_eq!(
            token.to_value(),
            json!({ "admin": "false", "session": "1234", "user": "alice" })
        );
    }

    #[test]
    fn dropped_token_fields_are_logged() {
        let logs = LogBuffer::default();
        let _guard = logs.install();

        let token = AccessToken::from_payload(&json!({
            "key": "abc",
            "expires": null,
            "scope": ["reports"],
        }));

        assert_eq!(token.fields().len(), 1);
        let output = logs.contents();
        assert!(output.contains("dropping nil access token field"));
        assert!(output.contains("expires"));
        assert!(output.contains("dropping nested access token field"));
        assert!(output.contains("scope"));
    }

    #[test]
    fn absent_token_payload_is_empty() {
        assert!(AccessToken::from_payload(&Value::Null).is_empty());
    }

    #[test]
    fn credentials_debug_hides_password() {
        let rendered = format!("{:?}", Credentials::new("alice", "hunter2"));
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn handles_serialize_transparently() {
        let record = json!({ "key": "3", "name": "Day" });
        let handle: CategoryHandle = serde_json::from_value(record.clone()).unwrap();
        assert_eq!(handle.name(), Some("Day"));
        assert_eq!(serde_json::to_value(&handle).unwrap(), record);
        assert_eq!(handle.to_value(), record);
    }

    #[test]
    fn time_range_bounds_use_the_reference_offset() {
        let range: TimeRangeHandle = serde_json::from_value(json!({
            "name": "Today",
            "start": "1700000000",
            "end": 1700086400,
        }))
        .unwrap();

        let start = range.start().unwrap();
        assert_eq!(start.timestamp(), 1_700_000_000);
        assert_eq!(start.offset().local_minus_utc(), -7 * 3600);
        assert_eq!(range.end().unwrap().timestamp(), 1_700_086_400);
        assert_eq!(start.to_rfc3339(), "2023-11-14T15:13:20-07:00");
    }

    #[test]
    fn order_by_renders_field_and_direction() {
        let by_bytes = OrderBy {
            field: OrderField::NumBytes,
            direction: Some(Direction::Desc),
        };
        let by_name = OrderBy {
            field: OrderField::ItemName,
            direction: None,
        };
        assert_eq!(by_bytes.to_string(), "num_bytes desc");
        assert_eq!(by_name.to_string(), "item_name");
    }
}
