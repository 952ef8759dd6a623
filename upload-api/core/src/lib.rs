#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod authorize;
mod config;
mod endpoint;
mod identity;
mod request;
mod review;

pub use self::{
    authorize::{Authorization, Authorizer, ReviewError},
    config::{AuthConfigSource, HeaderConfig},
    endpoint::is_info_endpoint,
    identity::{extract_identity, Identity, IdentityError},
    request::{is_authenticated, RequestInfo, TlsStatus},
    review::{AccessReview, ResourceAttributes, ReviewClient, Verdict},
};
