//! Word-level Markov model of a channel.
//!
//! This module provides:
//! - Word states with counted successors (`State`)
//! - The per-channel transition table (`ChannelModel`)
//! - Bounded stochastic generation (`Generator`)

/// Bounded sequence generation over a channel model snapshot.
///
/// Handles seeding, bridge steps, sentence terminators and the retry budget.
pub mod generator;

/// First-order transition table of one channel.
///
/// Handles message tokenization, pair learning, prediction and merging.
pub mod channel_model;

/// A single word and its observed successors.
///
/// Tracks successor multiplicities and supports weighted random sampling.
pub mod state;
