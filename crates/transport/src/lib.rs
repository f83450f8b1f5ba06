//! # qx-transport
//!
//! Bounded, lock-free, single-producer/single-consumer transport between
//! pipeline stages. One stage owns the [`Producer`] endpoint, exactly one
//! other stage owns the [`Consumer`] endpoint, and neither operation ever
//! blocks: a full ring is reported back to the caller, which must resolve
//! it by policy (drop, retry with a bound) rather than by waiting.

pub mod ring;

pub use ring::{channel, Consumer, Full, Producer};
