//! A stateful RCON client for executing commands on a server.
//! <https://wiki.vg/RCON>
//!
//! The protocol frame is little-endian throughout: an i32 length covering
//! the remainder, an i32 request ID, an i32 type, the payload, and two
//! trailing NUL bytes.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::options::RconOptions;
use crate::util::{self, SrvProtocol, DEFAULT_JAVA_PORT};
use crate::Error;

const TYPE_COMMAND: i32 = 2;
const TYPE_LOGIN: i32 = 3;
const TYPE_COMMAND_RESPONSE: i32 = 0;
const TYPE_LOGIN_RESPONSE: i32 = 2;

/// A client for interacting with a server over RCON.
///
/// The lifecycle is `dial → login → run/execute → close`. After a
/// successful login a background task reads command responses into an
/// internal channel; [`Client::execute`] pops them one at a time.
pub struct Client {
    stream: Option<TcpStream>,
    writer: Option<OwnedWriteHalf>,
    messages: Option<mpsc::UnboundedReceiver<String>>,
    reader: Option<JoinHandle<()>>,
    authenticated: bool,
    request_id: i32,
    timeout: Duration,
    debug: bool,
}

impl Client {
    /// Connects to the server and returns a client ready for
    /// [`Client::login`].
    ///
    /// # Errors
    ///
    /// Fails when the connection cannot be established before the
    /// configured deadline.
    pub async fn dial(host: &str, port: u16, options: RconOptions) -> Result<Self, Error> {
        let srv = util::resolve_srv(
            SrvProtocol::Tcp,
            host,
            port,
            DEFAULT_JAVA_PORT,
            options.enable_srv,
        )
        .await;

        let (connect_host, connect_port) = srv
            .as_ref()
            .map_or((host, port), |record| (record.host.as_str(), record.port));

        let stream = util::timed(
            options.timeout,
            TcpStream::connect((connect_host, connect_port)),
        )
        .await?;

        if options.debug {
            debug!(host = connect_host, port = connect_port, "connected to server");
        }

        Ok(Self {
            stream: Some(stream),
            writer: None,
            messages: None,
            reader: None,
            authenticated: false,
            request_id: 0,
            timeout: options.timeout,
            debug: options.debug,
        })
    }

    /// Authenticates with the server using the plaintext password.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidPassword`] when the server rejects the
    /// password, [`Error::AlreadyLoggedIn`] on repeated logins, and
    /// [`Error::NotConnected`] once the connection is gone.
    pub async fn login(&mut self, password: &str) -> Result<(), Error> {
        if self.authenticated {
            return Err(Error::AlreadyLoggedIn);
        }

        let Some(mut stream) = self.stream.take() else {
            return Err(Error::NotConnected);
        };

        let request_id = self.next_request_id();
        let timeout = self.timeout;

        // https://wiki.vg/RCON#3:_Login
        let result = util::timed(timeout, async {
            write_frame(&mut stream, request_id, TYPE_LOGIN, password).await?;

            let (received_id, packet_type, _) = read_frame(&mut stream).await?;

            if received_id == -1 {
                return Err(Error::InvalidPassword);
            }

            if received_id != request_id {
                return Err(Error::UnexpectedRequestId {
                    expected: request_id,
                    received: received_id,
                });
            }

            if packet_type != TYPE_LOGIN_RESPONSE {
                return Err(Error::UnexpectedPacketType {
                    expected: TYPE_LOGIN_RESPONSE,
                    received: packet_type,
                });
            }

            Ok(())
        })
        .await;

        match result {
            Ok(()) => {
                let (read_half, write_half) = stream.into_split();
                let (sender, receiver) = mpsc::unbounded_channel();

                self.reader = Some(tokio::spawn(read_messages(read_half, sender)));
                self.writer = Some(write_half);
                self.messages = Some(receiver);
                self.authenticated = true;

                if self.debug {
                    debug!("authenticated with the server");
                }

                Ok(())
            }
            Err(Error::InvalidPassword) => {
                // The connection survives a failed password; the caller
                // may retry.
                self.stream = Some(stream);
                Err(Error::InvalidPassword)
            }
            Err(err) => Err(err),
        }
    }

    /// Executes the command on the server without waiting for a response.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotAuthenticated`] before a successful login,
    /// or [`Error::NotConnected`] once the connection is gone.
    pub async fn run(&mut self, command: &str) -> Result<(), Error> {
        if !self.authenticated {
            if self.stream.is_none() && self.writer.is_none() {
                return Err(Error::NotConnected);
            }

            return Err(Error::NotAuthenticated);
        }

        let request_id = self.next_request_id();
        let timeout = self.timeout;

        let Some(writer) = self.writer.as_mut() else {
            return Err(Error::NotConnected);
        };

        // https://wiki.vg/RCON#2:_Command
        let result = util::timed(
            timeout,
            write_frame(writer, request_id, TYPE_COMMAND, command),
        )
        .await;

        if result.is_err() {
            self.close().await;
        }

        result
    }

    /// Executes the command on the server and waits for the next command
    /// response.
    ///
    /// Long responses may be fragmented by the server into several command
    /// response packets; this returns one packet body per call, without
    /// reassembly. Cancel by dropping the future or wrapping it in a
    /// timeout.
    ///
    /// # Errors
    ///
    /// As [`Client::run`], plus [`Error::NotConnected`] when the
    /// connection closes while waiting.
    pub async fn execute(&mut self, command: &str) -> Result<String, Error> {
        self.run(command).await?;

        let payload = {
            let Some(messages) = self.messages.as_mut() else {
                return Err(Error::NotConnected);
            };

            messages.recv().await
        };

        match payload {
            Some(payload) => Ok(payload),
            None => {
                self.close().await;
                Err(Error::NotConnected)
            }
        }
    }

    /// Closes the connection. Safe to call repeatedly and while the
    /// background reader is parked on a read.
    pub async fn close(&mut self) {
        self.authenticated = false;
        self.request_id = 0;

        if let Some(reader) = self.reader.take() {
            reader.abort();
        }

        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }

        self.stream = None;
        self.messages = None;
    }

    /// Returns the current request ID and post-increments the counter.
    fn next_request_id(&mut self) -> i32 {
        let value = self.request_id;
        self.request_id = self.request_id.wrapping_add(1);
        value
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// The background reader: pushes each command response body onto the
/// channel until the stream closes or a protocol violation occurs.
async fn read_messages(mut reader: OwnedReadHalf, sender: mpsc::UnboundedSender<String>) {
    loop {
        match read_frame(&mut reader).await {
            Ok((_, TYPE_COMMAND_RESPONSE, payload)) => {
                if sender.send(payload).is_err() {
                    break;
                }
            }
            Ok((_, packet_type, _)) => {
                debug!(packet_type, "ignoring unexpected packet type");
                break;
            }
            Err(_) => break,
        }
    }
    // Dropping the sender closes the channel and wakes blocked callers.
}

async fn write_frame<W>(writer: &mut W, request_id: i32, packet_type: i32, payload: &str) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    let length = i32::try_from(10 + payload.len()).map_err(|_| {
        Error::IoError(io::Error::new(
            io::ErrorKind::InvalidInput,
            "payload too large",
        ))
    })?;

    let mut frame = Vec::with_capacity(14 + payload.len());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&request_id.to_le_bytes());
    frame.extend_from_slice(&packet_type.to_le_bytes());
    frame.extend_from_slice(payload.as_bytes());
    frame.extend_from_slice(&[0x00, 0x00]);

    writer.write_all(&frame).await?;
    writer.flush().await?;

    Ok(())
}

async fn read_frame<R>(reader: &mut R) -> Result<(i32, i32, String), Error>
where
    R: AsyncRead + Unpin,
{
    let length = match reader.read_i32_le().await {
        Ok(length) => length,
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Err(Error::Closed),
        Err(err) => return Err(err.into()),
    };

    if length < 10 {
        return Err(Error::IoError(io::Error::new(
            io::ErrorKind::InvalidData,
            "RCON frame too short",
        )));
    }

    let request_id = reader.read_i32_le().await?;
    let packet_type = reader.read_i32_le().await?;

    let mut rest = vec![0u8; usize::try_from(length)? - 8];
    reader.read_exact(&mut rest).await?;

    // Strip the two trailing NUL bytes from the payload.
    rest.truncate(rest.len().saturating_sub(2));

    Ok((
        request_id,
        packet_type,
        String::from_utf8_lossy(&rest).into_owned(),
    ))
}
