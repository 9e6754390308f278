//! Cloud-management API
//!
//! OAuth token handling, tenant resolution and instance lifecycle calls over
//! an [`HttpClient`].

pub mod api;
pub mod http;
pub mod responses;
pub mod token;

pub use api::AuraApi;
pub use http::{HttpBody, HttpClient, HttpRequest, HttpResponse, Method, ReqwestHttpClient};
pub use responses::{
    InstanceCreateDetails, InstanceDetails, InstanceSpecificDetails, TenantDetails, TenantSummary,
};
pub use token::{AuthToken, TokenLifecycle};
