mod channel;
mod envelope;
mod http_channel;

pub use channel::{Fault, Intercepted, Interceptor, Param, RpcChannel, TracingInterceptor};
pub use envelope::{decode_response, encode_request, DecodeError, ITEM};
pub use http_channel::{SoapChannel, SoapConfig, DECODE_FAULT, DEFAULT_NAMESPACE, TRANSPORT_FAULT};
