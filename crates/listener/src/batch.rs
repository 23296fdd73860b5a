//! Batch buffer
//!
//! Fixed-capacity byte accumulator filled straight from sockets and request
//! bodies. Storage is allocated once and reused across batches.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::UdpSocket;

/// Reusable, capacity-bounded read buffer
#[derive(Debug)]
pub struct BatchBuffer {
    buf: Box<[u8]>,
    len: usize,
}

impl BatchBuffer {
    /// Create a buffer holding at most `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Receive one datagram into the free region
    ///
    /// Performs exactly one `recv`. A datagram larger than the free region
    /// is truncated by the OS.
    pub async fn read_once_from(&mut self, socket: &UdpSocket) -> io::Result<usize> {
        let n = socket.recv(&mut self.buf[self.len..]).await?;
        self.len += n;
        Ok(n)
    }

    /// Read from `reader` until end of input or the buffer is full
    ///
    /// Returns the bytes read along with the outcome. Bytes read before an
    /// error stay in the buffer.
    pub async fn read_from<R>(&mut self, reader: &mut R) -> (usize, io::Result<()>)
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let start = self.len;
        while self.len < self.buf.len() {
            match reader.read(&mut self.buf[self.len..]).await {
                Ok(0) => break,
                Ok(n) => self.len += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return (self.len - start, Err(e)),
            }
        }
        (self.len - start, Ok(()))
    }

    /// Bytes currently held
    #[inline]
    pub fn size(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Free space left
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// No free space left
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.buf.len()
    }

    /// The buffered bytes
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Drop the first `n` bytes and move the rest to the front
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.len);
        self.buf.copy_within(n..self.len, 0);
        self.len -= n;
    }

    /// Empty the buffer, keeping its storage
    #[inline]
    pub fn reset(&mut self) {
        self.len = 0;
    }
}

#[cfg(test)]
#[path = "batch_test.rs"]
mod batch_test;
