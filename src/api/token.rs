use tracing::info;

use super::request;
use super::types::{AccessToken, Credentials};
use crate::soap::{Fault, Param, RpcChannel};

/// Fault code used when `getAccess` succeeds but hands back nothing usable.
pub const EMPTY_TOKEN_FAULT: &str = "Client.Auth";

/// The remote operations this client knows how to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Access,
    AvailableReports,
    AvailableCategories,
    AvailableTimeRanges,
    ReportData,
    CurrentTraffic,
    DiskUsage,
    NetworkUsageSections,
    NetworkUsage,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Self::Access,
        Self::AvailableReports,
        Self::AvailableCategories,
        Self::AvailableTimeRanges,
        Self::ReportData,
        Self::CurrentTraffic,
        Self::DiskUsage,
        Self::NetworkUsageSections,
        Self::NetworkUsage,
    ];

    /// The operation name as sent on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Access => "getAccess",
            Self::AvailableReports => "getAvailableReports",
            Self::AvailableCategories => "getAvailableCategories",
            Self::AvailableTimeRanges => "getAvailableTimeRanges",
            Self::ReportData => "getReportData",
            Self::CurrentTraffic => "getCurrentTraffic",
            Self::DiskUsage => "getDiskUsage",
            Self::NetworkUsageSections => "getNetworkUsageSections",
            Self::NetworkUsage => "getNetworkUsage",
        }
    }

    /// Key into the token binding table, or `None` for the unauthenticated `getAccess`.
    pub fn binding_key(self) -> Option<&'static str> {
        match self {
            Self::Access => None,
            Self::AvailableReports => Some("availableReports"),
            Self::AvailableCategories => Some("categories"),
            Self::AvailableTimeRanges => Some("timeRanges"),
            Self::ReportData => Some("reportData"),
            Self::CurrentTraffic => Some("currentTraffic"),
            Self::DiskUsage => Some("diskUsage"),
            Self::NetworkUsageSections => Some("networkUsageSections"),
            Self::NetworkUsage => Some("networkUsage"),
        }
    }
}

/// The three shapes the service expects the access token wrapped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenBinding {
    SoapAccess,
    AccessToken,
    UserAccess,
}

impl TokenBinding {
    pub fn param_name(self) -> &'static str {
        match self {
            Self::SoapAccess => "soap_access",
            Self::AccessToken => "access_token",
            Self::UserAccess => "userAccess",
        }
    }

    pub fn type_tag(self) -> &'static str {
        match self {
            Self::SoapAccess => "ns1:SoapAccess",
            Self::AccessToken => "ns1:AccessToken",
            Self::UserAccess => "ns1:UserAccess",
        }
    }
}

/// Looks up how `operation` wants the token bound.
///
/// # Panics
///
/// Panics for an operation outside the table. The table covers every
/// authenticated [`Operation`], so reaching the panic is a programming error.
pub fn binding_for(operation: &str) -> TokenBinding {
    match operation {
        "categories" | "timeRanges" | "counterRanges" | "counterSections" | "counterUsage"
        | "diskUsage" | "liveWMAggregate" | "liveWMCounters" | "networkUsage"
        | "networkUsageSections" | "reportData" | "reportSummary" | "streams" => {
            TokenBinding::SoapAccess
        }
        "currentTraffic" => TokenBinding::AccessToken,
        "availableCounters" | "availableReports" => TokenBinding::UserAccess,
        unknown => panic!("no access token binding for operation `{unknown}`"),
    }
}

/// Wraps `token` under the parameter name and type `operation` requires.
pub fn bind(operation: &str, token: &AccessToken) -> Param {
    let binding = binding_for(operation);
    Param::new(binding.param_name(), binding.type_tag(), token.to_value())
}

/// Holds the session token between calls.
#[derive(Debug, Default)]
pub struct TokenManager {
    token: Option<AccessToken>,
}

impl TokenManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls `getAccess` and keeps the issued token.
    ///
    /// Any previous token is dropped first, so a failed attempt leaves the
    /// manager unauthenticated.
    pub async fn authenticate<C: RpcChannel + ?Sized>(
        &mut self,
        channel: &C,
        credentials: &Credentials,
    ) -> Result<&AccessToken, Fault> {
        self.token = None;

        let params = request::access(credentials);
        let payload = channel
            .call(Operation::Access.wire_name(), &params)
            .await?;

        let token = AccessToken::from_payload(&payload);
        if token.is_empty() {
            return Err(Fault::new(
                EMPTY_TOKEN_FAULT,
                "service returned an empty access token",
                payload.to_string(),
            ));
        }

        info!(username = %credentials.username, fields = token.fields().len(), "authenticated");
        Ok(self.token.insert(token))
    }

    pub fn token(&self) -> Option<&AccessToken> {
        self.token.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Forgets the current token.
    pub fn clear(&mut self) {
        self.token = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::ScriptedChannel;
    use serde_json::json;

    #[test]
    fn binding_table_names() {
        let soap_access = [
            "categories",
            "timeRanges",
            "counterRanges",
            "counterSections",
            "counterUsage",
            "diskUsage",
            "liveWMAggregate",
            "liveWMCounters",
            "networkUsage",
            "networkUsageSections",
            "reportData",
            "reportSummary",
            "streams",
        ];
        for operation in soap_access {
            assert_eq!(binding_for(operation).param_name(), "soap_access", "{operation}");
        }
        assert_eq!(binding_for("currentTraffic").param_name(), "access_token");
        assert_eq!(binding_for("availableCounters").param_name(), "userAccess");
        assert_eq!(binding_for("availableReports").param_name(), "userAccess");
    }

    #[test]
    fn every_authenticated_operation_has_a_binding() {
        for operation in Operation::ALL {
            if let Some(key) = operation.binding_key() {
                binding_for(key);
            }
        }
        assert_eq!(Operation::Access.binding_key(), None);
    }

    #[test]
    #[should_panic(expected = "no access token binding for operation `getAccess`")]
    fn unknown_operation_panics() {
        binding_for("getAccess");
    }

    #[test]
    fn bind_wraps_every_token_field() {
        let token = AccessToken::from_payload(&json!({ "user": "alice", "key": "abc" }));
        let param = bind("currentTraffic", &token);
        assert_eq!(param.name, "access_token");
        assert_eq!(param.type_tag, "ns1:AccessToken");
        assert_eq!(param.value, json!({ "key": "abc", "user": "alice" }));
    }

    #[tokio::test]
    async fn authenticate_stores_the_token() {
        let channel = ScriptedChannel::new()
            .respond("getAccess", Ok(json!({ "user": "alice", "key": "abc" })));
        let mut tokens = TokenManager::new();

        let token = tokens
            .authenticate(&channel, &Credentials::new("alice", "secret"))
            .await
            .unwrap();
        assert_eq!(token.get("key"), Some("abc"));
        assert!(tokens.is_authenticated());

        let calls = channel.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "getAccess");
        assert_eq!(calls[0].1[0], Param::new("username", "xsd:string", "alice"));
        assert_eq!(calls[0].1[1], Param::new("password", "xsd:string", "secret"));
    }

    #[tokio::test]
    async fn failed_authentication_drops_the_old_token() {
        let channel = ScriptedChannel::new()
            .respond("getAccess", Ok(json!({ "key": "abc" })))
            .respond("getAccess", Err(Fault::new("Client", "bad password", "")));
        let mut tokens = TokenManager::new();
        let credentials = Credentials::new("alice", "secret");

        tokens.authenticate(&channel, &credentials).await.unwrap();
        let fault = tokens.authenticate(&channel, &credentials).await.unwrap_err();

        assert_eq!(fault.message, "bad password");
        assert!(tokens.token().is_none());
    }

    #[tokio::test]
    async fn empty_token_is_a_fault() {
        let channel = ScriptedChannel::new().respond("getAccess", Ok(serde_json::Value::Null));
        let mut tokens = TokenManager::new();

        let fault = tokens
            .authenticate(&channel, &Credentials::new("alice", "secret"))
            .await
            .unwrap_err();
        assert_eq!(fault.code, EMPTY_TOKEN_FAULT);
        assert!(!tokens.is_authenticated());
    }
}
