// src/infrastructure/session_server.rs
use crate::application::{ReviewSession, SessionDispatcher};
use crate::constants::SESSION_IDLE_TIMEOUT_MS;
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Line-oriented JSON listener driving a review session.
///
/// Each request is one JSON object on its own line and gets exactly one reply
/// line. The listener stops after answering `exit`.
pub struct SessionServer<S: ReviewSession> {
    listener: TcpListener,
    dispatcher: SessionDispatcher<S>,
    poll_interval: Duration,
    idle_timeout: Duration,
}

impl<S: ReviewSession> SessionServer<S> {
    pub fn bind(addr: impl ToSocketAddrs, session: S, poll_interval: Duration) -> Result<Self> {
        let listener = TcpListener::bind(addr).context("Failed to bind session listener")?;
        listener
            .set_nonblocking(true)
            .context("Failed to make session listener non-blocking")?;
        info!(addr = ?listener.local_addr().ok(), "Session listener bound");

        Ok(Self {
            listener,
            dispatcher: SessionDispatcher::new(session),
            poll_interval,
            idle_timeout: Duration::from_millis(SESSION_IDLE_TIMEOUT_MS),
        })
    }

    /// Drop a client after it has sent nothing for `idle_timeout`.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `exit`, then hand the session back.
    pub fn run(mut self) -> Result<S> {
        while self.dispatcher.is_running() {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    debug!(%peer, "Session client connected");
                    if let Err(e) = self.serve_connection(stream) {
                        warn!(%peer, error = %e, "Session connection failed");
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(self.poll_interval),
                Err(e) => return Err(e).context("Failed to accept session connection"),
            }
        }
        info!("Session listener stopped");
        Ok(self.dispatcher.into_session())
    }

    fn serve_connection(&mut self, stream: TcpStream) -> Result<()> {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(self.idle_timeout))?;
        let mut writer = stream.try_clone()?;
        let reader = BufReader::new(stream);

        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    debug!("Session client idle, closing connection");
                    break;
                }
                Err(e) => return Err(e.into()),
            };
            if line.trim().is_empty() {
                continue;
            }
            let reply = match serde_json::from_str::<Value>(&line) {
                Ok(request) => self.dispatcher.handle(&request),
                Err(_) => json!({ "status": "nok", "info": "not understood" }),
            };
            writeln!(writer, "{}", reply)?;
            writer.flush()?;

            if !self.dispatcher.is_running() {
                break;
            }
        }
        Ok(())
    }
}

impl<S: ReviewSession + Send + 'static> SessionServer<S> {
    /// Serve on a background thread.
    pub fn spawn(self) -> Result<JoinHandle<Result<S>>> {
        thread::Builder::new()
            .name("session-listener".to_string())
            .spawn(move || self.run())
            .context("Failed to start session listener thread")
    }
}
