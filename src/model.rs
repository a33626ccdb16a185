//! Objects exchanged with the Spotify accounts service.
//!
//! The Web API responses themselves are returned as [serde_json::Value]s by the
//! [Dispatcher](crate::client::Dispatcher); the only typed objects are the ones the authorization flow relies on.

pub mod error;
pub mod token;
