//! Parameter lists for each remote operation.
//!
//! Handles are re-wrapped with their wire type and otherwise passed through
//! untouched. Authenticated calls always carry the bound token first.

use super::token::{bind, Operation};
use super::types::{
    AccessToken, CategoryHandle, Credentials, ReportHandle, SectionHandle, TimeRangeHandle,
};
use crate::soap::Param;

const STRING: &str = "xsd:string";
const INT: &str = "xsd:int";
const LONG: &str = "xsd:long";
const REPORT: &str = "ns1:Report";
const CATEGORY: &str = "ns1:Category";
const TIME_RANGE: &str = "ns1:TimeRange";
const SECTION: &str = "ns1:NetworkUsageSection";

fn authenticated(operation: Operation, token: &AccessToken) -> Vec<Param> {
    // Only `getAccess` lacks a binding key, and it never comes through here.
    let key = operation
        .binding_key()
        .unwrap_or_else(|| panic!("{} does not take an access token", operation.wire_name()));
    vec![bind(key, token)]
}

pub fn access(credentials: &Credentials) -> Vec<Param> {
    vec![
        Param::new("username", STRING, credentials.username.as_str()),
        Param::new("password", STRING, credentials.password.as_str()),
    ]
}

pub fn available_reports(token: &AccessToken) -> Vec<Param> {
    authenticated(Operation::AvailableReports, token)
}

pub fn available_categories(token: &AccessToken, report: &ReportHandle) -> Vec<Param> {
    let mut params = authenticated(Operation::AvailableCategories, token);
    params.push(Param::new("report", REPORT, report.to_value()));
    params
}

pub fn available_time_ranges(token: &AccessToken, report: &ReportHandle) -> Vec<Param> {
    let mut params = authenticated(Operation::AvailableTimeRanges, token);
    params.push(Param::new("report", REPORT, report.to_value()));
    params
}

/// `order_by` is sent as-is; `None` becomes the empty string, meaning no explicit order.
pub fn report_data(
    token: &AccessToken,
    report: &ReportHandle,
    category: &CategoryHandle,
    time_range: &TimeRangeHandle,
    order_by: Option<&str>,
) -> Vec<Param> {
    let mut params = authenticated(Operation::ReportData, token);
    params.push(Param::new("report", REPORT, report.to_value()));
    params.push(Param::new("category", CATEGORY, category.to_value()));
    params.push(Param::new("timeRange", TIME_RANGE, time_range.to_value()));
    params.push(Param::new("orderBy", STRING, order_by.unwrap_or_default()));
    params
}

pub fn current_traffic(token: &AccessToken) -> Vec<Param> {
    authenticated(Operation::CurrentTraffic, token)
}

pub fn disk_usage(
    token: &AccessToken,
    report: &ReportHandle,
    time_range: &TimeRangeHandle,
) -> Vec<Param> {
    let mut params = authenticated(Operation::DiskUsage, token);
    params.push(Param::new("report", REPORT, report.to_value()));
    params.push(Param::new("timeRange", TIME_RANGE, time_range.to_value()));
    params
}

pub fn network_usage_sections(token: &AccessToken, report: &ReportHandle) -> Vec<Param> {
    let mut params = authenticated(Operation::NetworkUsageSections, token);
    params.push(Param::new("report", REPORT, report.to_value()));
    params
}

/// `start` and `end` are seconds since the epoch, `interval` the sample width in seconds.
pub fn network_usage(
    token: &AccessToken,
    report: &ReportHandle,
    section: &SectionHandle,
    start: i64,
    end: i64,
    interval: u32,
) -> Vec<Param> {
    let mut params = authenticated(Operation::NetworkUsage, token);
    params.push(Param::new("report", REPORT, report.to_value()));
    params.push(Param::new("section", SECTION, section.to_value()));
    params.push(Param::new("start", LONG, start));
    params.push(Param::new("end", LONG, end));
    params.push(Param::new("interval", INT, interval));
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn token() -> AccessToken {
        AccessToken::from_payload(&json!({ "user": "alice", "key": "abc" }))
    }

    fn handle<T: From<crate::api::Record>>(value: Value) -> T {
        match value {
            Value::Object(record) => T::from(record),
            _ => unreachable!(),
        }
    }

    fn names(params: &[Param]) -> Vec<&str> {
        params.iter().map(|param| param.name).collect()
    }

    #[test]
    fn report_data_defaults_order_to_empty_string() {
        let report: ReportHandle = handle(json!({ "key": "web", "name": "Web" }));
        let category: CategoryHandle = handle(json!({ "id": "7", "name": "Day" }));
        let range: TimeRangeHandle = handle(json!({ "name": "Today", "start": "1", "end": "2" }));

        let params = report_data(&token(), &report, &category, &range, None);

        assert_eq!(
            names(&params),
            ["soap_access", "report", "category", "timeRange", "orderBy"]
        );
        assert_eq!(params[4], Param::new("orderBy", "xsd:string", ""));
        assert_eq!(params[1].value, json!({ "key": "web", "name": "Web" }));
        assert_eq!(params[2].type_tag, "ns1:Category");
    }

    #[test]
    fn report_data_passes_order_through_unvalidated() {
        let report: ReportHandle = handle(json!({ "key": "web" }));
        let category: CategoryHandle = handle(json!({ "id": "7" }));
        let range: TimeRangeHandle = handle(json!({ "name": "Today" }));

        let params = report_data(&token(), &report, &category, &range, Some("bogus sideways"));
        assert_eq!(params[4].value, json!("bogus sideways"));
    }

    #[test]
    fn token_binding_leads_each_call() {
        let report: ReportHandle = handle(json!({ "key": "web" }));

        assert_eq!(names(&available_reports(&token())), ["userAccess"]);
        assert_eq!(names(&current_traffic(&token())), ["access_token"]);
        assert_eq!(
            names(&available_categories(&token(), &report)),
            ["soap_access", "report"]
        );
        assert_eq!(
            names(&network_usage_sections(&token(), &report)),
            ["soap_access", "report"]
        );
    }

    #[test]
    fn network_usage_sends_window_and_interval() {
        let report: ReportHandle = handle(json!({ "key": "web" }));
        let section: SectionHandle = handle(json!({ "name": "eth0" }));

        let params = network_usage(&token(), &report, &section, 100, 200, 60);
        assert_eq!(
            names(&params),
            ["soap_access", "report", "section", "start", "end", "interval"]
        );
        assert_eq!(params[3].value, json!(100));
        assert_eq!(params[5], Param::new("interval", "xsd:int", 60u32));
    }

    #[test]
    fn access_sends_credentials_without_a_token() {
        let params = access(&Credentials::new("alice", "secret"));
        assert_eq!(names(&params), ["username", "password"]);
    }
}
