use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// A single, ordered parameter of a remote call.
///
/// `type_tag` is the nominal wire type the service declares for the argument
/// (for example `Report` or `SoapAccess`); the channel emits it verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: &'static str,
    pub type_tag: &'static str,
    pub value: Value,
}

impl Param {
    pub fn new(name: &'static str, type_tag: &'static str, value: impl Into<Value>) -> Self {
        Self {
            name,
            type_tag,
            value: value.into(),
        }
    }
}

/// A structured error returned by the service in place of a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message} ({detail})")]
pub struct Fault {
    pub code: String,
    pub message: String,
    pub detail: String,
}

impl Fault {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            detail: detail.into(),
        }
    }
}

/// The transport the client speaks through.
///
/// Implementations serialize the operation and its parameters, send them, and
/// hand back either the decoded payload or a [`Fault`]. An absent payload is
/// returned as [`Value::Null`]. Transport problems are reported as faults too.
#[async_trait]
pub trait RpcChannel: Send + Sync {
    async fn call(&self, operation: &str, params: &[Param]) -> Result<Value, Fault>;
}

#[async_trait]
impl<C: RpcChannel + ?Sized> RpcChannel for Box<C> {
    async fn call(&self, operation: &str, params: &[Param]) -> Result<Value, Fault> {
        (**self).call(operation, params).await
    }
}

/// Observes every call passing through an [`Intercepted`] channel.
pub trait Interceptor: Send + Sync {
    fn before_call(&self, operation: &str, params: &[Param]);
    fn after_call(&self, operation: &str, result: &Result<Value, Fault>);
}

/// Parameters carrying credentials; their values are never logged.
const SECRET_PARAMS: [&str; 4] = ["password", "soap_access", "access_token", "userAccess"];

/// The unauthenticated login call, whose answer is the access token itself.
const ACCESS_OPERATION: &str = "getAccess";

const REDACTED: &str = "<redacted>";

/// Stock interceptor: reports calls through `tracing`.
///
/// Values are only logged at `trace` level. Passwords, bound access tokens
/// and the `getAccess` answer are masked.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingInterceptor;

impl Interceptor for TracingInterceptor {
    fn before_call(&self, operation: &str, params: &[Param]) {
        debug!(operation, params = params.len(), "calling remote operation");
        for param in params {
            if SECRET_PARAMS.contains(&param.name) {
                trace!(
                    operation,
                    name = param.name,
                    type_tag = param.type_tag,
                    value = REDACTED,
                    "request parameter"
                );
            } else {
                trace!(
                    operation,
                    name = param.name,
                    type_tag = param.type_tag,
                    value = %param.value,
                    "request parameter"
                );
            }
        }
    }

    fn after_call(&self, operation: &str, result: &Result<Value, Fault>) {
        match result {
            Ok(_) if operation == ACCESS_OPERATION => {
                debug!(operation, "remote operation succeeded");
                trace!(operation, payload = REDACTED, "response payload");
            }
            Ok(payload) => {
                debug!(operation, "remote operation succeeded");
                trace!(operation, %payload, "response payload");
            }
            Err(fault) => warn!(
                operation,
                code = %fault.code,
                message = %fault.message,
                detail = %fault.detail,
                "remote operation faulted"
            ),
        }
    }
}

/// Wraps a channel so an [`Interceptor`] sees each request and its outcome.
pub struct Intercepted<C, I = TracingInterceptor> {
    inner: C,
    interceptor: I,
}

impl<C: RpcChannel> Intercepted<C> {
    /// Wraps `inner` with the [`TracingInterceptor`].
    pub fn traced(inner: C) -> Self {
        Self::new(inner, TracingInterceptor)
    }
}

impl<C: RpcChannel, I: Interceptor> Intercepted<C, I> {
    pub fn new(inner: C, interceptor: I) -> Self {
        Self { inner, interceptor }
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

#[async_trait]
impl<C: RpcChannel, I: Interceptor> RpcChannel for Intercepted<C, I> {
    async fn call(&self, operation: &str, params: &[Param]) -> Result<Value, Fault> {
        self.interceptor.before_call(operation, params);
        let result = self.inner.call(operation, params).await;
        self.interceptor.after_call(operation, &result);
        result
    }
}
