pub mod facebook;
pub mod forward;

pub use forward::{HttpForwarder, LeadForwarder};
