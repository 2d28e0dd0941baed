//! HTTP routing for the thaw core: request decoding, bearer-token identity,
//! and mapping of core outcomes onto status codes.

pub mod auth;
pub mod channels;
pub mod error;
pub mod messages;
pub mod middleware;
