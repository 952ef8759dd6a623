#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod auth_config;
mod review;

pub use self::{
    auth_config::{AuthConfigWatcher, CONFIG_MAP_NAME, CONFIG_MAP_NAMESPACE},
    review::SubjectAccessReviewClient,
};
