//! Client for a SOAP reporting service.
//!
//! [`api::ApiClient`] authenticates, binds the session token into each call,
//! and normalizes the service's responses. It talks through any
//! [`soap::RpcChannel`]; [`soap::SoapChannel`] is the HTTP implementation.

pub mod api;
pub mod soap;

pub use api::{ApiClient, ApiError, Credentials};
pub use soap::{Fault, SoapChannel, SoapConfig};
