//! Word Stream Buffer: fixed-capacity blocks of 32-bit words served one at
//! a time, refilled by blocking reads that silently span producer sessions.

use std::str::FromStr;

use crate::endpoint::{Endpoint, PipeError, Session, SessionRead};

/// Default block buffer capacity: 1,048,576 words (4 MiB).
pub const DEFAULT_BLOCK_WORDS: usize = 1 << 20;

/// A streamed-volume report is logged each time the cumulative word count
/// crosses a multiple of this.
const REPORT_INTERVAL_WORDS: u64 = 1 << 24;

/// How the producer's 4-byte words are laid out on the wire.
///
/// `Native` matches a producer on the same machine and is the default; the
/// byte order is never negotiated in-band, so producer and consumer must
/// agree on it out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Native,
    Little,
    Big,
}

impl ByteOrder {
    pub fn decode(self, bytes: [u8; 4]) -> u32 {
        match self {
            ByteOrder::Native => u32::from_ne_bytes(bytes),
            ByteOrder::Little => u32::from_le_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
        }
    }
}

impl FromStr for ByteOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "native" => Ok(ByteOrder::Native),
            "little" | "le" => Ok(ByteOrder::Little),
            "big" | "be" => Ok(ByteOrder::Big),
            _ => Err(format!(
                "unknown byte order: {} (expected native, little or big)",
                s
            )),
        }
    }
}

/// The pull capability handed to the consumer (the test battery).
pub trait WordSource {
    /// Return the next 32-bit word, blocking as long as it takes.
    fn next_word(&mut self) -> Result<u32, PipeError>;
}

/// Pull source of 32-bit words backed by batched reads from the endpoint.
///
/// Owns the block buffer exclusively. Cursors are in words: valid words
/// occupy `[0, endw)` of the block and unconsumed ones `[pos, endw)`, with
/// `0 <= pos <= endw <= capacity` at all times.
#[derive(Debug)]
pub struct WordStream {
    endpoint: Endpoint,
    session: Session,
    block: Vec<u8>,
    pos: usize,
    endw: usize,
    words_served: u64,
    byte_order: ByteOrder,
}

impl WordStream {
    /// Validate the configuration, then block until the first producer
    /// connects to `endpoint`.
    pub fn open(
        endpoint: Endpoint,
        capacity_words: usize,
        byte_order: ByteOrder,
    ) -> Result<Self, PipeError> {
        if capacity_words == 0 {
            return Err(PipeError::Config(
                "block capacity must be at least one word".into(),
            ));
        }
        let capacity_bytes = capacity_words.checked_mul(4).ok_or_else(|| {
            PipeError::Config(format!(
                "block capacity of {capacity_words} words overflows the byte size"
            ))
        })?;
        let session = endpoint.wait_for_producer()?;
        Ok(Self {
            endpoint,
            session,
            block: vec![0u8; capacity_bytes],
            pos: 0,
            endw: 0,
            words_served: 0,
            byte_order,
        })
    }

    /// Block buffer capacity in words.
    pub fn capacity(&self) -> usize {
        self.block.len() / 4
    }

    /// Unconsumed words currently buffered.
    pub fn buffered_words(&self) -> usize {
        self.endw - self.pos
    }

    /// Cumulative words delivered across all sessions. Never resets.
    pub fn words_served(&self) -> u64 {
        self.words_served
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Return the next word, triggering a blocking refill when the block
    /// is exhausted. The consumer never observes a session boundary.
    pub fn next_word(&mut self) -> Result<u32, PipeError> {
        if self.pos == self.endw {
            self.refill()?;
        }
        let base = self.pos * 4;
        let word = self.byte_order.decode([
            self.block[base],
            self.block[base + 1],
            self.block[base + 2],
            self.block[base + 3],
        ]);
        self.pos += 1;
        Ok(word)
    }

    /// Refill the entire block, reconnecting as many times as it takes.
    ///
    /// A session may end mid-word; the next session resumes at the exact
    /// byte offset where the previous one stopped, so no word is ever
    /// split incorrectly across sessions.
    fn refill(&mut self) -> Result<(), PipeError> {
        self.pos = 0;
        self.endw = 0;
        let mut filled = 0;
        while filled < self.block.len() {
            match self.session.read_exact(&mut self.block[filled..])? {
                SessionRead::Complete => filled = self.block.len(),
                SessionRead::Ended(n) => {
                    filled += n;
                    self.session = self.endpoint.reconnect()?;
                }
            }
        }
        self.endw = self.capacity();

        let before = self.words_served;
        self.words_served += self.endw as u64;
        if crossed_report_interval(before, self.words_served) {
            log::info!(
                "streamed {} words ({:.3} GiB)",
                self.words_served,
                self.words_served as f64 * 4.0 / (1u64 << 30) as f64
            );
        }
        Ok(())
    }
}

impl WordSource for WordStream {
    fn next_word(&mut self) -> Result<u32, PipeError> {
        WordStream::next_word(self)
    }
}

/// True when the counter passed a multiple of [`REPORT_INTERVAL_WORDS`],
/// including a single refill spanning several multiples.
fn crossed_report_interval(before: u64, after: u64) -> bool {
    before / REPORT_INTERVAL_WORDS != after / REPORT_INTERVAL_WORDS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::net::UnixStream;
    use std::path::Path;
    use std::thread;
    use std::time::Duration;

    fn connect_retry(path: &Path) -> UnixStream {
        for _ in 0..400 {
            if let Ok(stream) = UnixStream::connect(path) {
                return stream;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("producer could not connect to {}", path.display());
    }

    fn spawn_producer(path: &Path, bytes: Vec<u8>) -> thread::JoinHandle<()> {
        let path = path.to_path_buf();
        thread::spawn(move || {
            let mut stream = connect_retry(&path);
            stream.write_all(&bytes).unwrap();
        })
    }

    fn words_to_le_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn decode_respects_configured_byte_order() {
        let bytes = [0x01, 0x02, 0x03, 0x04];
        assert_eq!(ByteOrder::Little.decode(bytes), 0x0403_0201);
        assert_eq!(ByteOrder::Big.decode(bytes), 0x0102_0304);
        let native = ByteOrder::Native.decode(bytes);
        assert!(
            native == ByteOrder::Little.decode(bytes) || native == ByteOrder::Big.decode(bytes)
        );
        #[cfg(target_endian = "little")]
        assert_eq!(native, 0x0403_0201);
    }

    #[test]
    fn byte_order_parses_from_str() {
        assert_eq!("native".parse::<ByteOrder>().unwrap(), ByteOrder::Native);
        assert_eq!("LE".parse::<ByteOrder>().unwrap(), ByteOrder::Little);
        assert_eq!("big".parse::<ByteOrder>().unwrap(), ByteOrder::Big);
        assert!("middle".parse::<ByteOrder>().is_err());
    }

    #[test]
    fn report_interval_crossing() {
        let step = 1 << 20;
        assert!(!crossed_report_interval(0, step));
        assert!(!crossed_report_interval((1 << 24) - 2 * step, (1 << 24) - step));
        // landing exactly on the boundary counts as crossing it
        assert!(crossed_report_interval((1 << 24) - step, 1 << 24));
        assert!(!crossed_report_interval(1 << 24, (1 << 24) + step));
        // one refill can span several multiples
        assert!(crossed_report_interval(0, 3 << 24));
    }

    #[test]
    fn zero_capacity_is_rejected_before_waiting() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = Endpoint::new(dir.path().join("rng.sock"));
        // must fail immediately, without blocking for a producer
        let err = WordStream::open(endpoint, 0, ByteOrder::Native).unwrap_err();
        assert!(matches!(err, PipeError::Config(_)), "got {err}");
    }

    #[test]
    fn oversized_capacity_is_rejected_before_waiting() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = Endpoint::new(dir.path().join("rng.sock"));
        // word count whose byte size does not fit in usize
        let err = WordStream::open(endpoint, usize::MAX / 2, ByteOrder::Native).unwrap_err();
        assert!(matches!(err, PipeError::Config(_)), "got {err}");
    }

    #[test]
    fn words_arrive_in_order_within_one_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rng.sock");
        let capacity = 8;

        let words: Vec<u32> = (1..=capacity as u32).collect();
        let producer = spawn_producer(&path, words_to_le_bytes(&words));

        let endpoint = Endpoint::new(&path);
        let mut stream = WordStream::open(endpoint, capacity, ByteOrder::Little).unwrap();
        for expect in 1..=capacity as u32 {
            assert_eq!(stream.next_word().unwrap(), expect);
        }
        producer.join().unwrap();

        assert_eq!(stream.words_served(), capacity as u64);
        assert_eq!(stream.buffered_words(), 0);
    }

    #[test]
    fn buffered_words_never_exceed_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rng.sock");
        let capacity = 4;

        let producer = spawn_producer(&path, words_to_le_bytes(&[10, 20, 30, 40]));

        let endpoint = Endpoint::new(&path);
        let mut stream = WordStream::open(endpoint, capacity, ByteOrder::Little).unwrap();
        assert_eq!(stream.buffered_words(), 0);
        for pulled in 1..=capacity {
            stream.next_word().unwrap();
            assert!(stream.buffered_words() <= stream.capacity());
            assert_eq!(stream.buffered_words(), capacity - pulled);
        }
        producer.join().unwrap();
    }

    #[test]
    fn mid_word_session_end_resumes_at_the_exact_byte() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rng.sock");
        let capacity = 8;

        let words: Vec<u32> = (100..100 + capacity as u32).collect();
        let bytes = words_to_le_bytes(&words);
        // first producer stops two bytes into the final word
        let split = bytes.len() - 2;

        let first = spawn_producer(&path, bytes[..split].to_vec());
        let endpoint = Endpoint::new(&path);
        let mut stream = WordStream::open(endpoint, capacity, ByteOrder::Little).unwrap();
        first.join().unwrap();

        // second producer supplies the remaining two bytes once the
        // endpoint re-listens during the refill
        let second = spawn_producer(&path, bytes[split..].to_vec());
        for &expect in &words {
            assert_eq!(stream.next_word().unwrap(), expect);
        }
        second.join().unwrap();

        assert_eq!(stream.words_served(), capacity as u64);
    }

    #[test]
    fn counter_increases_by_capacity_per_refill() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rng.sock");
        let capacity = 4;

        let words: Vec<u32> = (0..2 * capacity as u32).collect();
        let producer = spawn_producer(&path, words_to_le_bytes(&words));

        let endpoint = Endpoint::new(&path);
        let mut stream = WordStream::open(endpoint, capacity, ByteOrder::Little).unwrap();
        assert_eq!(stream.words_served(), 0);
        stream.next_word().unwrap();
        assert_eq!(stream.words_served(), capacity as u64);
        for _ in 1..capacity {
            stream.next_word().unwrap();
        }
        stream.next_word().unwrap();
        assert_eq!(stream.words_served(), 2 * capacity as u64);
        producer.join().unwrap();
    }
}
