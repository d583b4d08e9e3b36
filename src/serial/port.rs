//! Trait abstraction for the duplex byte stream an MSP session runs over

use std::io;

use tokio::io::{AsyncRead, AsyncWrite};

/// Duplex byte stream carrying MSP frames
///
/// Anything readable and writable works; the only extra requirement is a
/// way to throw away bytes that are still buffered, so a new exchange starts
/// on a frame boundary.
pub trait MspPort: AsyncRead + AsyncWrite + Unpin + Send {
    /// Discard bytes pending in both the input and output buffers
    fn clear_buffers(&mut self) -> io::Result<()>;
}

impl MspPort for tokio_serial::SerialStream {
    fn clear_buffers(&mut self) -> io::Result<()> {
        use tokio_serial::{ClearBuffer, SerialPort};
        SerialPort::clear(self, ClearBuffer::All).map_err(io::Error::from)
    }
}
