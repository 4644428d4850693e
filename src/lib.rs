//! `rng-pipe` — bridge a piped stream of 32-bit random numbers to a
//! statistical test battery, without staging the data on disk.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐  raw bytes   ┌────────────────────┐
//!  │ Producer │─────────────▶│ Endpoint / Session │  (Unix socket lifecycle)
//!  └──────────┘   (socket)   └─────────┬──────────┘
//!                                      │ blocking block refills,
//!                                      │ transparent reconnect
//!                            ┌─────────▼──────────┐
//!                            │     WordStream     │  (block buffer of u32s)
//!                            └─────────┬──────────┘
//!                                      │ next_word() pulls
//!                            ┌─────────▼──────────┐
//!                            │       bridge       │  (pump into the consumer)
//!                            └────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`endpoint`] — listening-socket lifecycle: wait for a producer, read
//!   from the live session, reconnect when the producer goes away
//! - [`stream`]   — fixed-capacity block buffer serving one 32-bit word per
//!   pull, refilled across producer sessions without the consumer noticing
//! - [`bridge`]   — consumer-facing driver that pumps words into any byte
//!   sink until the consumer stops reading
//!
//! The whole crate is single-threaded and blocking: the consumer drives
//! everything by pulling words, and every wait (for a producer to connect,
//! for bytes to arrive) blocks that one thread indefinitely.

pub mod bridge;
pub mod endpoint;
pub mod stream;

pub use bridge::pump_words;
pub use endpoint::{Endpoint, PipeError, Session, SessionRead};
pub use stream::{ByteOrder, WordSource, WordStream, DEFAULT_BLOCK_WORDS};
