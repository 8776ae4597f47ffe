//! Client SDK for the WeChat Pay v2 and Alipay gateway APIs.
//!
//! The crate assembles signed requests against the providers' published
//! endpoints, posts them, parses the XML/JSON responses and verifies the
//! response signatures. Field names, required parameters and signature
//! exclusion rules are dictated by the providers and reproduced here as-is.

pub mod alipay;
mod core;
mod utils;
pub mod wechat;

pub use crate::core::{HttpTransport, Transport, TransportError};
