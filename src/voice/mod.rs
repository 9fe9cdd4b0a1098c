//! Voice demo proxy. Keeps the Retell API key server-side.

mod retell;

pub use retell::{RetellClient, WebCall, WebCallProvider, WebCallRequest};
