//! Background draining of a child process's stderr.
//!
//! ffmpeg can print an unbounded amount of diagnostics (one line per broken
//! macroblock on a corrupt input). If nobody reads the pipe, ffmpeg stalls
//! on a full stderr buffer while we stall on its stdout or stdin.

use std::io::{ErrorKind, Read};
use std::process::ChildStderr;
use std::thread::JoinHandle;

use tracing::warn;

/// Bytes of stderr kept for error messages
const TAIL_LIMIT: usize = 8 * 1024;

/// Reads a child's stderr on its own thread, keeping only the last
/// `TAIL_LIMIT` bytes
pub(crate) struct StderrTail {
    handle: Option<JoinHandle<Vec<u8>>>,
}

impl StderrTail {
    pub(crate) fn spawn(stderr: Option<ChildStderr>) -> Self {
        let handle = stderr.and_then(|pipe| {
            std::thread::Builder::new()
                .name("ffmpeg-stderr".to_string())
                .spawn(move || drain(pipe))
                .map_err(|e| warn!("Could not start stderr reader: {}", e))
                .ok()
        });
        Self { handle }
    }

    /// Wait for the pipe to close and return the kept text
    ///
    /// Call after the child has exited or been killed; a second call
    /// returns an empty string.
    pub(crate) fn join(&mut self) -> String {
        self.handle
            .take()
            .and_then(|handle| handle.join().ok())
            .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
            .unwrap_or_default()
    }
}

fn drain<R: Read>(mut pipe: R) -> Vec<u8> {
    let mut tail = Vec::new();
    let mut buf = [0u8; 4096];

    loop {
        match pipe.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > 2 * TAIL_LIMIT {
                    tail.drain(..tail.len() - TAIL_LIMIT);
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }

    if tail.len() > TAIL_LIMIT {
        tail.drain(..tail.len() - TAIL_LIMIT);
    }
    tail
}
