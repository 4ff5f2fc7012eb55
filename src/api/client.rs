use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::normalize;
use super::request;
use super::token::{Operation, TokenManager};
use super::types::{
    AccessToken, CategoryHandle, Credentials, Record, ReportHandle, SectionHandle,
    TimeRangeHandle, UsageAggregate,
};
use crate::soap::{Fault, Param, RpcChannel};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The service (or the channel on its behalf) answered with a fault.
    #[error("service fault {0}")]
    Fault(#[from] Fault),
    /// An authenticated operation was attempted before `authenticate`.
    #[error("not authenticated; call authenticate() first")]
    NotAuthenticated,
}

/// Client for the reporting service.
///
/// One method per remote operation. Each call clears the recorded fault,
/// and a faulting call records it again, so [`ApiClient::error_message`]
/// always describes the most recent call.
#[derive(Debug)]
pub struct ApiClient<C> {
    channel: C,
    credentials: Credentials,
    tokens: TokenManager,
    last_fault: Option<Fault>,
}

impl<C: RpcChannel> ApiClient<C> {
    /// Creates an unauthenticated client around the given channel.
    pub fn new(channel: C, credentials: Credentials) -> Self {
        Self {
            channel,
            credentials,
            tokens: TokenManager::new(),
            last_fault: None,
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_authenticated()
    }

    pub fn access_token(&self) -> Option<&AccessToken> {
        self.tokens.token()
    }

    /// The fault recorded by the most recent call, if it faulted.
    pub fn last_fault(&self) -> Option<&Fault> {
        self.last_fault.as_ref()
    }

    /// Human-readable rendering of [`ApiClient::last_fault`]; empty when there is none.
    pub fn error_message(&self) -> String {
        match &self.last_fault {
            Some(fault) => format!(
                "SOAP fault {}: {} (detail: {})",
                fault.code, fault.message, fault.detail
            ),
            None => String::new(),
        }
    }

    /// Obtains a session token with the client's credentials.
    pub async fn authenticate(&mut self) -> Result<&AccessToken, ApiError> {
        self.last_fault = None;
        match self
            .tokens
            .authenticate(&self.channel, &self.credentials)
            .await
        {
            Ok(token) => Ok(token),
            Err(fault) => {
                self.last_fault = Some(fault.clone());
                Err(ApiError::Fault(fault))
            }
        }
    }

    fn token(&mut self) -> Result<&AccessToken, ApiError> {
        self.last_fault = None;
        self.tokens.token().ok_or(ApiError::NotAuthenticated)
    }

    async fn call(&mut self, operation: Operation, params: Vec<Param>) -> Result<Value, ApiError> {
        debug!(operation = operation.wire_name(), "dispatching");
        match self.channel.call(operation.wire_name(), &params).await {
            Ok(payload) => Ok(payload),
            Err(fault) => {
                self.last_fault = Some(fault.clone());
                Err(ApiError::Fault(fault))
            }
        }
    }

    pub async fn available_reports(&mut self) -> Result<Vec<ReportHandle>, ApiError> {
        let params = request::available_reports(self.token()?);
        let payload = self.call(Operation::AvailableReports, params).await?;
        Ok(normalize::records(payload))
    }

    pub async fn categories(
        &mut self,
        report: &ReportHandle,
    ) -> Result<Vec<CategoryHandle>, ApiError> {
        let params = request::available_categories(self.token()?, report);
        let payload = self.call(Operation::AvailableCategories, params).await?;
        Ok(normalize::records(payload))
    }

    /// Finds the category of `report` named exactly `name`.
    ///
    /// Returns `None` unless there is exactly one match; a missing or
    /// duplicated name is logged as a warning.
    pub async fn category(
        &mut self,
        name: &str,
        report: &ReportHandle,
    ) -> Result<Option<CategoryHandle>, ApiError> {
        let mut matches: Vec<CategoryHandle> = self
            .categories(report)
            .await?
            .into_iter()
            .filter(|category| category.name() == Some(name))
            .collect();

        match matches.len() {
            1 => Ok(matches.pop()),
            0 => {
                warn!(category = name, report = ?report.name(), "no category with this name");
                Ok(None)
            }
            count => {
                warn!(
                    category = name,
                    report = ?report.name(),
                    count,
                    "category name is ambiguous"
                );
                Ok(None)
            }
        }
    }

    pub async fn time_ranges(
        &mut self,
        report: &ReportHandle,
    ) -> Result<Vec<TimeRangeHandle>, ApiError> {
        let params = request::available_time_ranges(self.token()?, report);
        let payload = self.call(Operation::AvailableTimeRanges, params).await?;
        Ok(normalize::records(payload))
    }

    /// Fetches report rows.
    ///
    /// `order_by` is e.g. `num_bytes desc`; `None` leaves ordering to the service.
    pub async fn report_data(
        &mut self,
        report: &ReportHandle,
        category: &CategoryHandle,
        time_range: &TimeRangeHandle,
        order_by: Option<&str>,
    ) -> Result<Vec<Record>, ApiError> {
        let params =
            request::report_data(self.token()?, report, category, time_range, order_by);
        let payload = self.call(Operation::ReportData, params).await?;
        Ok(normalize::records(payload))
    }

    pub async fn current_traffic(&mut self) -> Result<Record, ApiError> {
        let params = request::current_traffic(self.token()?);
        let payload = self.call(Operation::CurrentTraffic, params).await?;
        Ok(normalize::record(payload))
    }

    pub async fn disk_usage(
        &mut self,
        report: &ReportHandle,
        time_range: &TimeRangeHandle,
    ) -> Result<UsageAggregate, ApiError> {
        let params = request::disk_usage(self.token()?, report, time_range);
        let payload = self.call(Operation::DiskUsage, params).await?;
        Ok(normalize::usage(payload))
    }

    pub async fn network_usage_sections(
        &mut self,
        report: &ReportHandle,
    ) -> Result<Vec<SectionHandle>, ApiError> {
        let params = request::network_usage_sections(self.token()?, report);
        let payload = self.call(Operation::NetworkUsageSections, params).await?;
        Ok(normalize::records(payload))
    }

    /// Samples network usage of `section` between two epoch timestamps.
    pub async fn network_usage(
        &mut self,
        report: &ReportHandle,
        section: &SectionHandle,
        start: i64,
        end: i64,
        interval: u32,
    ) -> Result<UsageAggregate, ApiError> {
        let params =
            request::network_usage(self.token()?, report, section, start, end, interval);
        let payload = self.call(Operation::NetworkUsage, params).await?;
        Ok(normalize::usage(payload))
    }
}
