//! Operational logging. The audit trail lives in [`crate::audit`].

pub mod activity;
