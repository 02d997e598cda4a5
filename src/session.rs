//! Progress reporting for publish runs
//!
//! Every publish step reports a one-line message to a [`ProgressSink`]. The
//! CLI either logs them ([`LogSink`]) or streams them to a consumer over TCP
//! ([`SessionListener`]): the publisher binds an ephemeral port, prints it and
//! waits for one consumer to connect. If nobody connects within the timeout
//! the session is abandoned and the listener released. On the wire every
//! message is followed by [`FRAME_DELIMITER`].
//!
//! The publish pipeline itself is synchronous, so each session owns a small
//! current-thread tokio runtime and blocks on it for socket operations.

use crate::error::{Error, Result};
use log::{info, warn};
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::{Builder, Runtime};

/// Terminates every message on the wire.
pub const FRAME_DELIMITER: &str = "@@@";

/// Receiver of progress messages.
pub trait ProgressSink: Send + Sync {
    fn message(&self, text: &str);
}

/// Forwards messages to the log.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn message(&self, text: &str) {
        info!("{}", text);
    }
}

/// Keeps every message in memory.
#[derive(Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }
}

impl ProgressSink for CollectingSink {
    fn message(&self, text: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(text.to_string());
        }
    }
}

fn runtime() -> Result<Runtime> {
    Ok(Builder::new_current_thread().enable_all().build()?)
}

/// Listening side of a progress session, before a consumer connected.
pub struct SessionListener {
    listener: TcpListener,
    runtime: Runtime,
    timeout: Duration,
}

impl SessionListener {
    /// Bind an ephemeral port on the loopback interface.
    pub fn bind(timeout: Duration) -> Result<Self> {
        Self::bind_to("127.0.0.1:0", timeout)
    }

    pub fn bind_to(addr: &str, timeout: Duration) -> Result<Self> {
        let runtime = runtime()?;
        let listener = runtime.block_on(TcpListener::bind(addr))?;
        Ok(Self {
            listener,
            runtime,
            timeout,
        })
    }

    pub fn port(&self) -> Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }

    /// Wait for the first consumer. The listener is closed either way.
    pub fn accept(self) -> Result<SocketSink> {
        let Self {
            listener,
            runtime,
            timeout,
        } = self;

        let accepted = runtime.block_on(async { tokio::time::timeout(timeout, listener.accept()).await });
        drop(listener);

        match accepted {
            Ok(Ok((stream, peer))) => {
                info!("Progress consumer connected from {}", peer);
                Ok(SocketSink {
                    stream: Mutex::new(stream),
                    runtime,
                })
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                warn!("No progress consumer connected within {:?}", timeout);
                Err(Error::SessionTimeout {
                    seconds: timeout.as_secs(),
                })
            }
        }
    }
}

/// Connected progress session.
pub struct SocketSink {
    // Dropped before the runtime driving it
    stream: Mutex<TcpStream>,
    runtime: Runtime,
}

impl ProgressSink for SocketSink {
    fn message(&self, text: &str) {
        let Ok(mut stream) = self.stream.lock() else {
            return;
        };
        let frame = format!("{}{}", text, FRAME_DELIMITER);
        let sent = self.runtime.block_on(async {
            stream.write_all(frame.as_bytes()).await?;
            stream.flush().await
        });
        if let Err(e) = sent {
            warn!("Progress consumer went away: {}", e);
        }
    }
}

/// Splits a byte stream into frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and return every frame completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let delimiter = FRAME_DELIMITER.as_bytes();
        self.pending.extend_from_slice(bytes);
        let mut frames = Vec::new();
        while let Some(end) = self
            .pending
            .windows(delimiter.len())
            .position(|w| w == delimiter)
        {
            frames.push(String::from_utf8_lossy(&self.pending[..end]).into_owned());
            self.pending.drain(..end + delimiter.len());
        }
        frames
    }

    /// Trailing bytes after the last delimiter, if any.
    pub fn finish(self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.pending).into_owned())
        }
    }
}

/// Consumer side of a progress session.
pub struct SessionReader {
    stream: TcpStream,
    runtime: Runtime,
}

impl SessionReader {
    /// Connect to a publisher's session on the loopback interface.
    pub fn connect(port: u16) -> Result<Self> {
        let runtime = runtime()?;
        let stream = runtime.block_on(TcpStream::connect(("127.0.0.1", port)))?;
        Ok(Self { stream, runtime })
    }

    /// Call `on_frame` for every message until the publisher closes the
    /// session.
    pub fn read_frames(self, mut on_frame: impl FnMut(&str)) -> Result<()> {
        let Self {
            mut stream,
            runtime,
        } = self;
        let mut decoder = FrameDecoder::new();
        runtime.block_on(async {
            let mut buf = [0u8; 4096];
            loop {
                let read = stream.read(&mut buf).await?;
                if read == 0 {
                    return Ok::<_, std::io::Error>(());
                }
                for frame in decoder.push(&buf[..read]) {
                    on_frame(&frame);
                }
            }
        })?;
        if let Some(tail) = decoder.finish() {
            on_frame(&tail);
        }
        Ok(())
    }
}
