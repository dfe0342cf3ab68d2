/// Chunked byte relays between caller buffers and child pipes
///
/// A relay copies until the source reports end of stream. Any I/O failure
/// (typically a broken pipe once the child has exited) ends the copy
/// quietly: relays run inside a supervised call and never surface errors.
use std::io::{ErrorKind, Read, Write};

pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// How a relay finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    /// Source reached end of stream
    Complete,
    /// Copy stopped early on an I/O failure
    Interrupted,
}

#[derive(Debug, Clone, Copy)]
pub struct StreamRelay {
    chunk_size: usize,
}

impl Default for StreamRelay {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl StreamRelay {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Copy `source` into `sink`, then close `sink`.
    ///
    /// Used for the child's stdin: dropping the pipe is what delivers EOF.
    pub fn feed<R: Read, W: Write>(&self, mut source: R, mut sink: W) -> RelayEnd {
        let end = self.copy(&mut source, &mut sink);
        drop(sink);
        end
    }

    /// Copy `source` into a caller-owned `sink` that stays open.
    pub fn drain<R: Read, W: Write + ?Sized>(&self, mut source: R, sink: &mut W) -> RelayEnd {
        self.copy(&mut source, sink)
    }

    fn copy<R: Read, W: Write + ?Sized>(&self, source: &mut R, sink: &mut W) -> RelayEnd {
        let mut chunk = vec![0u8; self.chunk_size];
        loop {
            let read = match source.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::debug!("relay read stopped: {}", e);
                    return RelayEnd::Interrupted;
                }
            };

            if let Err(e) = sink.write_all(&chunk[..read]) {
                log::debug!("relay write stopped: {}", e);
                return RelayEnd::Interrupted;
            }
        }

        if let Err(e) = sink.flush() {
            log::debug!("relay flush failed: {}", e);
            return RelayEnd::Interrupted;
        }
        RelayEnd::Complete
    }
}
