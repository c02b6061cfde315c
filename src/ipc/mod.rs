//! Framed JSON transport
//!
//! Browser native messaging: each frame is a 32-bit length in native byte
//! order followed by that many bytes of UTF-8 JSON. The same framing is
//! served over a Unix socket for local tooling.

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use crate::constants::host::{APP_DIR, MAX_MESSAGE_SIZE, SOCKET_FILENAME};

pub mod messages;
pub use messages::{ExtensionMessage, HostCommand, HostEvent, MessageResponse, Status};

/// Get default socket path (XDG_RUNTIME_DIR with fallback to cache)
pub fn default_socket_path() -> Result<PathBuf> {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return Ok(PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME));
    }

    let cache = dirs::cache_dir()
        .context("Failed to determine cache directory (no XDG_RUNTIME_DIR or HOME)")?;
    Ok(cache.join(APP_DIR).join(SOCKET_FILENAME))
}

/// One accepted socket client
pub struct HostConnection {
    stream: UnixStream,
}

impl HostConnection {
    /// Connect to a serving host
    pub fn connect_to(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path)
            .context(format!("Failed to connect to host at {}", path.display()))?;
        Ok(Self { stream })
    }

    /// Independent reader and writer halves over the same socket
    pub fn split(self) -> Result<(UnixStream, UnixStream)> {
        let reader = self
            .stream
            .try_clone()
            .context("Failed to clone socket for reading")?;
        Ok((reader, self.stream))
    }
}

/// Socket listener serving the frame protocol
pub struct HostServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl HostServer {
    pub fn bind() -> Result<Self> {
        let socket_path = default_socket_path()?;
        Self::bind_to(socket_path)
    }

    pub fn bind_to(socket_path: PathBuf) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create socket directory: {}", parent.display()))?;
        }

        if socket_path.exists() {
            std::fs::remove_file(&socket_path)
                .context(format!("Failed to remove stale socket: {}", socket_path.display()))?;
        }

        let listener = UnixListener::bind(&socket_path)
            .context(format!("Failed to bind socket at {}", socket_path.display()))?;

        // Owner only
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o700))
                .context("Failed to set socket permissions")?;
        }

        Ok(Self {
            listener,
            socket_path,
        })
    }

    /// Accept incoming connection (blocking)
    pub fn accept(&self) -> Result<HostConnection> {
        let (stream, _addr) = self
            .listener
            .accept()
            .context("Failed to accept host connection")?;
        Ok(HostConnection { stream })
    }

    pub fn path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for HostServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Write one length-prefixed frame
pub fn write_message<W: Write, T: Serialize>(writer: &mut W, msg: &T) -> Result<()> {
    let json = serde_json::to_vec(msg).context("Failed to serialize message to JSON")?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(anyhow!(
            "Message too large: {} bytes (max: {})",
            json.len(),
            MAX_MESSAGE_SIZE
        ));
    }

    let len = json.len() as u32;
    writer
        .write_all(&len.to_ne_bytes())
        .context("Failed to write message length")?;
    writer
        .write_all(&json)
        .context("Failed to write message payload")?;
    writer.flush().context("Failed to flush stream")?;

    Ok(())
}

/// Read one raw frame payload
///
/// Returns `Ok(None)` when the stream ends cleanly between frames.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        match reader.read(&mut len_buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(anyhow!("Stream ended inside message length")),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("Failed to read message length"),
        }
    }
    let len = u32::from_ne_bytes(len_buf) as usize;

    // Sanity check before allocating
    if len > MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {} bytes (max: {})", len, MAX_MESSAGE_SIZE));
    }

    let mut json_buf = vec![0u8; len];
    reader
        .read_exact(&mut json_buf)
        .context("Failed to read message payload")?;
    Ok(Some(json_buf))
}

/// Read and decode one frame
pub fn read_message<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<Option<T>> {
    let Some(json) = read_frame(reader)? else {
        return Ok(None);
    };
    serde_json::from_slice(&json)
        .map(Some)
        .context("Failed to deserialize message from JSON")
}
