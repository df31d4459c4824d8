//! Application layer containing the loan billing logic.
//!
//! [`engine::BillingEngine`] originates loans, reports delinquency and
//! applies payments; [`context::RequestContext`] bounds each call by the
//! caller's deadline.

pub mod context;
pub mod engine;
