//! Static converters for containers and foundation values
//!
//! Every converter here has two managed representations, selected by
//! [`MarshalOptions::KOTLINCOMPAT`](crate::MarshalOptions::KOTLINCOMPAT):
//! the idiomatic managed type copied eagerly, or a bridged wrapper from
//! `bridge/lib` / `bridge/foundation` sharing the idiomatic value.

mod collections;
mod foundation;
mod outcome;

pub use foundation::{Data, Timestamp};
