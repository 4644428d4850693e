//! Consumer-facing driver: pumps words from a [`WordSource`] into a byte
//! sink until the consumer stops reading.
//!
//! The shipped binary's consumer is an external battery process reading our
//! stdout, so "the consumer is done" shows up as a broken pipe on the sink.

use std::io::{ErrorKind, Write};

use crate::endpoint::PipeError;
use crate::stream::WordSource;

/// Pull words from `source` and write them to `sink`, one 4-byte word at a
/// time, until the consumer closes its end.
///
/// The sink always receives platform-native byte order: the source has
/// already decoded the wire per its configured
/// [`ByteOrder`](crate::stream::ByteOrder), and handing
/// the consumer native words is the pipe equivalent of an in-process
/// battery receiving the decoded `u32` directly. On a non-native wire
/// order the sink bytes therefore differ from the wire bytes.
///
/// Returns the number of whole words the sink accepted. A sink failure
/// other than `BrokenPipe` is fatal ([`PipeError::Consumer`]); source
/// failures propagate unchanged.
pub fn pump_words<S: WordSource, W: Write>(source: &mut S, sink: &mut W) -> Result<u64, PipeError> {
    let mut written = 0u64;
    loop {
        let word = source.next_word()?;
        match sink.write_all(&word.to_ne_bytes()) {
            Ok(()) => written += 1,
            Err(e) if e.kind() == ErrorKind::BrokenPipe => return Ok(written),
            Err(e) => return Err(PipeError::Consumer(e)),
        }
    }
}
