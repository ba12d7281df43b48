//! The event envelope.
//!
//! An event is an opaque value carried end-to-end; `FeedEvent<T>` is the
//! optional wrapper a source can apply (`EventWrapStrategy::Named`) to
//! attach feed identity, a monotonic per-source sequence, and a data
//! version alongside the raw payload.

use std::sync::Arc;

/// Envelope wrapping a raw event with feed identity and sequencing.
/// Wrapping is a per-source configuration choice (§3).
#[derive(Debug, Clone)]
pub struct FeedEvent<T> {
    pub feed_name: Arc<str>,
    pub sequence: u64,
    pub data_version: u32,
    pub data: T,
    pub event_time: u64,
}

/// Whether a source's publisher wraps outgoing events in a `FeedEvent`
/// envelope or dispatches the raw value as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventWrapStrategy {
    #[default]
    Raw,
    Named,
}

/// The value a publisher actually writes to a target queue: either the raw
/// event or a `FeedEvent` envelope around it, depending on
/// `EventWrapStrategy`. Kept as a dedicated enum (rather than forcing every
/// source to produce a `FeedEvent<T>`) so unwrapped sources pay no
/// allocation or indirection cost.
#[derive(Debug, Clone)]
pub enum Dispatched<T> {
    Raw(T),
    Named(FeedEvent<T>),
}

impl<T> Dispatched<T> {
    pub fn into_inner(self) -> T {
        match self {
            Dispatched::Raw(v) => v,
            Dispatched::Named(fe) => fe.data,
        }
    }

    pub fn inner(&self) -> &T {
        match self {
            Dispatched::Raw(v) => v,
            Dispatched::Named(fe) => &fe.data,
        }
    }
}
