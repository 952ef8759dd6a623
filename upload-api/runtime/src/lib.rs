#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod args;
mod service;

pub use self::{
    args::Args,
    service::{AuthGate, NotImplemented},
};
