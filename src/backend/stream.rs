//! Transport over plain byte streams (pipes, sockets, terminals).

use super::{ModemLines, SerialBackend};
use crate::SerialInbound;
use std::io::{self, ErrorKind, Read, Write};
use std::thread::JoinHandle;

/// Writes guest output to any [`Write`].
///
/// The writer should be non-blocking or fast; a write that would block drops
/// the byte. A broken pipe marks the peer as gone, which the port sees as DCD,
/// DSR and CTS dropping on its next modem line poll.
pub struct StreamBackend<W> {
    name: String,
    writer: W,
    connected: bool,
    dropped: u64,
}

impl<W: Write + Send> StreamBackend<W> {
    pub fn new(name: impl Into<String>, writer: W) -> Self {
        StreamBackend {
            name: name.into(),
            writer,
            connected: true,
            dropped: 0,
        }
    }

    /// Bytes discarded because the writer failed or the peer went away.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> SerialBackend for StreamBackend<W> {
    fn send(&mut self, byte: u8) {
        if !self.connected {
            self.dropped += 1;
            return;
        }
        match self.writer.write(&[byte]) {
            Ok(1) => {}
            Ok(_) => self.dropped += 1,
            Err(err) if err.kind() == ErrorKind::BrokenPipe => {
                tracing::info!(port = self.name, "serial output broken pipe, disconnecting");
                self.connected = false;
                self.dropped += 1;
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => self.dropped += 1,
            Err(err) => {
                tracing::error!(
                    port = self.name,
                    error = &err as &dyn std::error::Error,
                    "serial write failed, dropping data"
                );
                self.dropped += 1;
            }
        }
    }

    fn modem_lines(&mut self) -> Option<ModemLines> {
        Some(if self.connected {
            ModemLines::CONNECTED
        } else {
            ModemLines::default()
        })
    }

    fn detach(&mut self) {
        if let Err(err) = self.writer.flush() {
            tracing::warn!(
                port = self.name,
                error = &err as &dyn std::error::Error,
                "failed to flush serial output on detach"
            );
        }
    }
}

/// Pumps `reader` into `inbound` on a dedicated thread until EOF, an error,
/// or the port detaching. EOF and errors are reported to the port as the
/// modem lines going down.
///
/// Input is handed over with [`SerialInbound::deliver_blocking`], so the
/// thread stops reading while the guest is not draining the port and nothing
/// is lost. Detach is only noticed between reads: a thread blocked in `read`
/// lingers until the reader yields data, EOF or an error. Close or shut down
/// the underlying handle after detaching to stop it promptly.
pub fn spawn_reader<R>(
    name: impl Into<String>,
    mut reader: R,
    inbound: SerialInbound,
) -> io::Result<JoinHandle<io::Result<()>>>
where
    R: Read + Send + 'static,
{
    let name = name.into();
    std::thread::Builder::new()
        .name(format!("{name}-rx"))
        .spawn(move || {
            let mut buf = [0; 256];
            loop {
                if inbound.is_detached() {
                    return Ok(());
                }
                match reader.read(&mut buf) {
                    Ok(0) => {
                        tracing::info!(port = name, "serial input closed");
                        inbound.disconnect();
                        return Ok(());
                    }
                    Ok(n) => inbound.deliver_blocking(&buf[..n]),
                    Err(err) if err.kind() == ErrorKind::Interrupted => {}
                    Err(err) => {
                        tracing::error!(
                            port = name,
                            error = &err as &dyn std::error::Error,
                            "failed to read serial input, disconnecting"
                        );
                        inbound.disconnect();
                        return Err(err);
                    }
                }
            }
        })
}
