//! Entry point for `rng-pipe`.
//!
//! Parses CLI arguments, sets up logging, opens the producer endpoint and
//! pumps 32-bit words to stdout for the test battery process to consume.
//! All stream logic lives in library modules; `main.rs` owns only process
//! setup and the fatal-error-to-exit-code translation.

use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use rng_pipe::{pump_words, ByteOrder, Endpoint, WordStream, DEFAULT_BLOCK_WORDS};

/// Stream 32-bit random words from a producer socket to stdout.
///
/// Stdout carries the raw word stream (pipe it into the battery); all
/// status and progress lines go to stderr.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Unix socket path the producer connects to.
    #[arg(short, long, default_value = "/tmp/rng-stream.sock")]
    socket: PathBuf,

    /// Block buffer capacity in 32-bit words.
    #[arg(long, default_value_t = DEFAULT_BLOCK_WORDS)]
    block_words: usize,

    /// Byte order of the incoming words: native, little or big.
    #[arg(long, default_value = "native")]
    byte_order: ByteOrder,
}

fn main() {
    // Progress and reconnect notices default to visible; RUST_LOG overrides.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("FATAL: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let endpoint = Endpoint::new(&cli.socket);
    log::info!(
        "waiting for producer to connect on {} ...",
        cli.socket.display()
    );
    let mut stream = WordStream::open(endpoint, cli.block_words, cli.byte_order)?;
    log::info!("producer connected; streaming words to stdout");

    let stdout = io::stdout();
    let mut sink = BufWriter::new(stdout.lock());
    let words = pump_words(&mut stream, &mut sink)?;

    // the consumer may already be gone by the time we flush the tail
    match sink.flush() {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
        Err(e) => return Err(e.into()),
    }
    log::info!("consumer finished after {words} words; pipe closed");
    Ok(())
}
