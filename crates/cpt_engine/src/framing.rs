//! Response framing for the engine's stdout.
//!
//! The engine ends every response with a fixed sentinel byte sequence.
//! [`SentinelFramer`] finds it in a byte stream; [`ResponseReader`] feeds the
//! framer from a pump thread so reads can honour a deadline and a cancel flag.

use std::collections::VecDeque;
use std::io::{self, Read};
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

/// End-of-response marker printed by the engine.
pub const DEFAULT_SENTINEL: &[u8] = &[0x04, 0x04, 0x04];

const PUMP_BUFFER_BYTES: usize = 8 * 1024;
const RECV_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    /// The sentinel ended after `consumed` bytes of the chunk.
    Complete { consumed: usize },
    Pending,
}

/// Rolling-window sentinel matcher.
#[derive(Debug, Clone)]
pub struct SentinelFramer {
    sentinel: Vec<u8>,
    window: VecDeque<u8>,
    frame: Vec<u8>,
}

impl SentinelFramer {
    pub fn new(sentinel: impl Into<Vec<u8>>) -> Self {
        let sentinel = sentinel.into();
        Self {
            window: VecDeque::with_capacity(sentinel.len()),
            sentinel,
            frame: Vec::new(),
        }
    }

    pub fn sentinel(&self) -> &[u8] {
        &self.sentinel
    }

    /// Appends bytes until the sentinel completes; bytes past it are not consumed.
    pub fn feed(&mut self, chunk: &[u8]) -> Feed {
        if self.sentinel.is_empty() {
            self.frame.extend_from_slice(chunk);
            return Feed::Pending;
        }

        for (index, byte) in chunk.iter().enumerate() {
            self.frame.push(*byte);
            if self.window.len() == self.sentinel.len() {
                self.window.pop_front();
            }
            self.window.push_back(*byte);
            if self.window.len() == self.sentinel.len() && self.window.iter().eq(&self.sentinel) {
                self.window.clear();
                return Feed::Complete {
                    consumed: index + 1,
                };
            }
        }
        Feed::Pending
    }

    /// Everything accumulated since the last frame, sentinel included.
    pub fn take_frame(&mut self) -> Vec<u8> {
        self.window.clear();
        mem::take(&mut self.frame)
    }

    pub fn pending(&self) -> &[u8] {
        &self.frame
    }
}

/// How a read ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The sentinel was seen.
    Framed(Vec<u8>),
    /// The stream ended first; holds whatever arrived.
    Closed(Vec<u8>),
}

impl ReadOutcome {
    pub fn into_text(self) -> String {
        let bytes = match self {
            Self::Framed(bytes) | Self::Closed(bytes) => bytes,
        };
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

#[derive(Debug)]
pub enum ReadError {
    Timeout,
    Cancelled,
    Pipe(io::Error),
}

enum PumpEvent {
    Bytes(Vec<u8>),
    Closed,
    Failed(io::Error),
}

pub struct ResponseReader {
    events: Receiver<PumpEvent>,
    framer: SentinelFramer,
    leftover: Vec<u8>,
    closed: bool,
}

impl ResponseReader {
    /// Starts a pump thread reading `source` until EOF. The thread is detached
    /// and exits once the source closes or the reader is dropped.
    pub fn spawn<R>(source: R, sentinel: impl Into<Vec<u8>>) -> Self
    where
        R: Read + Send + 'static,
    {
        let (sender, events) = mpsc::channel();
        thread::spawn(move || pump(source, sender));
        Self {
            events,
            framer: SentinelFramer::new(sentinel),
            leftover: Vec::new(),
            closed: false,
        }
    }

    /// Blocks until a frame completes, the stream closes, `timeout` elapses,
    /// or `cancel` is raised.
    pub fn read(
        &mut self,
        timeout: Option<Duration>,
        cancel: &AtomicBool,
    ) -> Result<ReadOutcome, ReadError> {
        let started = Instant::now();

        let carried = mem::take(&mut self.leftover);
        if let Some(frame) = self.absorb(&carried) {
            return Ok(ReadOutcome::Framed(frame));
        }
        if self.closed {
            return Ok(ReadOutcome::Closed(self.framer.take_frame()));
        }

        loop {
            if cancel.load(Ordering::Acquire) {
                return Err(ReadError::Cancelled);
            }

            let slice = match timeout {
                Some(limit) => {
                    let elapsed = started.elapsed();
                    if elapsed >= limit {
                        return Err(ReadError::Timeout);
                    }
                    (limit - elapsed).min(RECV_SLICE)
                }
                None => RECV_SLICE,
            };

            match self.events.recv_timeout(slice) {
                Ok(PumpEvent::Bytes(chunk)) => {
                    if let Some(frame) = self.absorb(&chunk) {
                        return Ok(ReadOutcome::Framed(frame));
                    }
                }
                Ok(PumpEvent::Closed) | Err(RecvTimeoutError::Disconnected) => {
                    self.closed = true;
                    return Ok(ReadOutcome::Closed(self.framer.take_frame()));
                }
                Ok(PumpEvent::Failed(err)) => {
                    self.closed = true;
                    return Err(ReadError::Pipe(err));
                }
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn absorb(&mut self, chunk: &[u8]) -> Option<Vec<u8>> {
        match self.framer.feed(chunk) {
            Feed::Complete { consumed } => {
                self.leftover.extend_from_slice(&chunk[consumed..]);
                Some(self.framer.take_frame())
            }
            Feed::Pending => None,
        }
    }
}

fn pump<R: Read>(mut source: R, sender: Sender<PumpEvent>) {
    let mut buffer = vec![0u8; PUMP_BUFFER_BYTES];
    loop {
        let event = match source.read(&mut buffer) {
            Ok(0) => PumpEvent::Closed,
            Ok(count) => PumpEvent::Bytes(buffer[..count].to_vec()),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => PumpEvent::Failed(err),
        };
        let last = !matches!(event, PumpEvent::Bytes(_));
        if sender.send(event).is_err() || last {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Feed, ReadError, ReadOutcome, ResponseReader, SentinelFramer, DEFAULT_SENTINEL};
    use std::io::{self, Read};
    use std::sync::atomic::AtomicBool;
    use std::sync::mpsc::{self, Receiver};
    use std::time::Duration;

    #[test]
    fn framer_stops_at_first_sentinel() {
        let mut framer = SentinelFramer::new(DEFAULT_SENTINEL);
        assert_eq!(
            framer.feed(b"menu\x04\x04\x04next"),
            Feed::Complete { consumed: 7 }
        );
        assert_eq!(framer.take_frame(), b"menu\x04\x04\x04".to_vec());
    }

    #[test]
    fn framer_matches_across_chunk_boundaries() {
        let mut framer = SentinelFramer::new(DEFAULT_SENTINEL);
        assert_eq!(framer.feed(b"a\x04"), Feed::Pending);
        assert_eq!(framer.feed(b"\x04"), Feed::Pending);
        assert_eq!(framer.feed(b"\x04b"), Feed::Complete { consumed: 1 });
        assert_eq!(framer.take_frame(), b"a\x04\x04\x04".to_vec());
    }

    #[test]
    fn partial_sentinels_do_not_frame() {
        let mut framer = SentinelFramer::new(DEFAULT_SENTINEL);
        assert_eq!(framer.feed(b"\x04\x04x\x04\x04"), Feed::Pending);
        assert_eq!(framer.pending(), b"\x04\x04x\x04\x04");
    }

    #[test]
    fn reader_keeps_trailing_bytes_for_next_read() {
        let source = io::Cursor::new(b"first\x04\x04\x04second\x04\x04\x04tail".to_vec());
        let mut reader = ResponseReader::spawn(source, DEFAULT_SENTINEL);
        let cancel = AtomicBool::new(false);
        let timeout = Some(Duration::from_secs(5));

        let first = reader.read(timeout, &cancel).expect("first frame");
        assert_eq!(first, ReadOutcome::Framed(b"first\x04\x04\x04".to_vec()));
        let second = reader.read(timeout, &cancel).expect("second frame");
        assert_eq!(second.into_text(), "second\u{4}\u{4}\u{4}");
        let third = reader.read(timeout, &cancel).expect("closed stream");
        assert_eq!(third, ReadOutcome::Closed(b"tail".to_vec()));
    }

    /// A reader that blocks until the test drops its sender.
    struct Blocking(Receiver<()>);

    impl Read for Blocking {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[test]
    fn reader_times_out_without_sentinel() {
        let (_hold, rx) = mpsc::channel::<()>();
        let mut reader = ResponseReader::spawn(Blocking(rx), DEFAULT_SENTINEL);
        let cancel = AtomicBool::new(false);
        let result = reader.read(Some(Duration::from_millis(120)), &cancel);
        assert!(matches!(result, Err(ReadError::Timeout)));
    }

    #[test]
    fn reader_honours_cancel_flag() {
        let (_hold, rx) = mpsc::channel::<()>();
        let mut reader = ResponseReader::spawn(Blocking(rx), DEFAULT_SENTINEL);
        let cancel = AtomicBool::new(true);
        let result = reader.read(None, &cancel);
        assert!(matches!(result, Err(ReadError::Cancelled)));
    }
}
