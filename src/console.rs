//=====================================================
// File: console.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Byte-oriented task I/O
// Objective: Offer a non-blocking input poll and an output sink, backed either
//            by the host terminal or by in-memory buffers
//=====================================================

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_queue::SegQueue;
use parking_lot::Mutex;
use tracing::{debug, warn};

/// I/O surface seen by the interpreter.
pub trait Console {
    /// Return the next input byte if one is available right now.
    fn poll_input(&mut self) -> Option<u8>;

    fn write_output(&mut self, bytes: &[u8]);

    /// Block until the user acknowledges a traced step.
    fn wait_ack(&mut self) {}
}

//=====================================================
// SECTION 1: Host Console
//=====================================================

/// Stdout plus a background stdin reader feeding a lock-free queue.
pub struct StdConsole {
    input: Arc<SegQueue<u8>>,
    closed: Arc<AtomicBool>,
    stdout: io::Stdout,
    write_failed: bool,
}

impl StdConsole {
    pub fn new() -> Self {
        let input = Arc::new(SegQueue::new());
        let closed = Arc::new(AtomicBool::new(false));
        let queue = Arc::clone(&input);
        let eof = Arc::clone(&closed);
        thread::spawn(move || {
            let mut stdin = io::stdin().lock();
            let mut buffer = [0u8; 256];
            loop {
                match stdin.read(&mut buffer) {
                    Ok(0) | Err(_) => break,
                    Ok(count) => buffer[..count].iter().for_each(|byte| queue.push(*byte)),
                }
            }
            debug!("stdin closed");
            eof.store(true, Ordering::SeqCst);
        });
        Self {
            input,
            closed,
            stdout: io::stdout(),
            write_failed: false,
        }
    }
}

impl Default for StdConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for StdConsole {
    fn poll_input(&mut self) -> Option<u8> {
        self.input.pop()
    }

    fn write_output(&mut self, bytes: &[u8]) {
        let mut out = self.stdout.lock();
        write_flushed(&mut out, bytes, &mut self.write_failed);
    }

    fn wait_ack(&mut self) {
        while self.input.pop().is_none() {
            if self.closed.load(Ordering::SeqCst) {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

/// Write and flush, warning about the first failure only.
fn write_flushed(out: &mut impl Write, bytes: &[u8], failed: &mut bool) {
    let result = out.write_all(bytes).and_then(|()| out.flush());
    if let Err(err) = result {
        if !*failed {
            *failed = true;
            warn!("task output lost: {}", err);
        }
    }
}

//=====================================================
// SECTION 2: In-Memory Console
//=====================================================

#[derive(Debug, Default)]
struct Buffers {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

/// Cloneable console with scripted input and captured output.
#[derive(Debug, Clone, Default)]
pub struct MemoryConsole {
    inner: Arc<Mutex<Buffers>>,
}

impl MemoryConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(input: impl AsRef<[u8]>) -> Self {
        let console = Self::new();
        console.feed(input);
        console
    }

    /// Queue more input bytes.
    pub fn feed(&self, input: impl AsRef<[u8]>) {
        self.inner.lock().input.extend(input.as_ref());
    }

    pub fn output(&self) -> Vec<u8> {
        self.inner.lock().output.clone()
    }

    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock().output).into_owned()
    }

    pub fn pending_input(&self) -> usize {
        self.inner.lock().input.len()
    }
}

impl Console for MemoryConsole {
    fn poll_input(&mut self) -> Option<u8> {
        self.inner.lock().input.pop_front()
    }

    fn write_output(&mut self, bytes: &[u8]) {
        self.inner.lock().output.extend_from_slice(bytes);
    }

    fn wait_ack(&mut self) {
        self.inner.lock().input.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_buffers() {
        let console = MemoryConsole::with_input("ab");
        let mut handle = console.clone();
        assert_eq!(handle.poll_input(), Some(b'a'));
        handle.write_output(b"ok");
        assert_eq!(console.pending_input(), 1);
        assert_eq!(console.output_string(), "ok");
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_is_flagged_once() {
        let mut failed = false;
        write_flushed(&mut BrokenPipe, b"x", &mut failed);
        assert!(failed);
        write_flushed(&mut BrokenPipe, b"y", &mut failed);
        assert!(failed);

        let mut sink = Vec::new();
        let mut ok = false;
        write_flushed(&mut sink, b"hi", &mut ok);
        assert!(!ok);
        assert_eq!(sink, b"hi".to_vec());
    }

    #[test]
    fn empty_input_polls_none() {
        let mut console = MemoryConsole::new();
        assert_eq!(console.poll_input(), None);
        console.feed([7u8]);
        assert_eq!(console.poll_input(), Some(7));
    }
}
