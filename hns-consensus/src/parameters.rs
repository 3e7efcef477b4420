//! Consensus parameters owned by the validation layer.

pub mod subsidy;
