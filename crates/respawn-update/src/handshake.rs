//! Readiness handshake between a restarting process and its replacement
//!
//! The parent listens on a loopback port and passes the address and a random
//! token to the child through the environment. The child calls
//! [`notify_ready`] once it can serve; the parent only exits after it has
//! received the matching token, so the two builds never both give up a
//! shared resource at the same time.

use std::env;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::process::Child;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{Result, UpdateError};

/// Environment variable holding the parent's listening address
pub const READY_ADDR_ENV: &str = "RESPAWN_READY_ADDR";

/// Environment variable holding the handshake token
pub const READY_TOKEN_ENV: &str = "RESPAWN_READY_TOKEN";

/// How often the parent checks for a connection or an exited child
const POLL_STEP: Duration = Duration::from_millis(25);

/// Longest token line read from a connection
const MAX_TOKEN_LINE: u64 = 64;

/// Parent side of the handshake
#[derive(Debug)]
pub struct ReadyListener {
    listener: TcpListener,
    addr: SocketAddr,
    token: String,
}

impl ReadyListener {
    /// Bind a loopback listener on an ephemeral port
    pub fn bind() -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .map_err(|e| UpdateError::process_io("cannot bind readiness listener", e))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| UpdateError::process_io("cannot configure readiness listener", e))?;
        let addr = listener
            .local_addr()
            .map_err(|e| UpdateError::process_io("cannot read readiness listener address", e))?;

        Ok(Self {
            listener,
            addr,
            token: uuid::Uuid::new_v4().to_string(),
        })
    }

    /// Address the child must connect to
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Token the child must send
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Environment to add to the child's command
    pub fn env(&self) -> [(&'static str, String); 2] {
        [
            (READY_ADDR_ENV, self.addr.to_string()),
            (READY_TOKEN_ENV, self.token.clone()),
        ]
    }

    /// Wait until `child` reports readiness, exits, or `timeout` elapses
    pub fn wait(&self, child: &mut Child, timeout: Duration) -> Result<()> {
        let deadline = Instant::now().checked_add(timeout).ok_or_else(|| {
            UpdateError::process(format!("readiness timeout {:?} is out of range", timeout))
        })?;
        debug!(
            "Waiting up to {:?} for pid {} to report readiness on {}",
            timeout,
            child.id(),
            self.addr
        );

        loop {
            if self.accept_pending(deadline)? {
                info!("Replacement process {} reported ready", child.id());
                return Ok(());
            }

            if let Some(status) = child
                .try_wait()
                .map_err(|e| UpdateError::process_io("cannot poll replacement process", e))?
            {
                // The child may have reported in just before exiting.
                if self.accept_pending(deadline)? {
                    info!("Replacement process {} reported ready", child.id());
                    return Ok(());
                }
                return Err(UpdateError::process(format!(
                    "replacement process exited before reporting readiness ({})",
                    status
                )));
            }

            if Instant::now() >= deadline {
                return Err(UpdateError::process(format!(
                    "replacement process did not report readiness within {:?}",
                    timeout
                )));
            }

            thread::sleep(POLL_STEP);
        }
    }

    /// Drain queued connections, returning true once one carries the token
    fn accept_pending(&self, deadline: Instant) -> Result<bool> {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if self.check_token(stream, deadline) {
                        return Ok(true);
                    }
                    warn!("Ignoring readiness connection from {} with a wrong token", peer);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) => return Err(UpdateError::process_io("readiness listener failed", e)),
            }
        }
    }

    fn check_token(&self, stream: TcpStream, deadline: Instant) -> bool {
        let remaining = deadline
            .saturating_duration_since(Instant::now())
            .max(POLL_STEP);
        if stream.set_nonblocking(false).is_err() || stream.set_read_timeout(Some(remaining)).is_err()
        {
            return false;
        }

        let mut line = String::new();
        match BufReader::new(stream.take(MAX_TOKEN_LINE)).read_line(&mut line) {
            Ok(_) => line.trim() == self.token,
            Err(e) => {
                debug!("Readiness connection failed: {}", e);
                false
            }
        }
    }
}

/// Child side of the handshake
///
/// Connects back to the parent named in the environment and sends the
/// token. Returns `Ok(false)` when this process was not started by a
/// restart (no handshake variables present). The environment is only read;
/// the next restart overwrites or clears the variables for its child.
pub fn notify_ready() -> Result<bool> {
    let Ok(addr) = env::var(READY_ADDR_ENV) else {
        return Ok(false);
    };
    let token = env::var(READY_TOKEN_ENV).unwrap_or_default();

    send_token(&addr, &token)?;
    Ok(true)
}

fn send_token(addr: &str, token: &str) -> Result<()> {
    let mut stream = TcpStream::connect(addr)
        .map_err(|e| UpdateError::process_io(format!("cannot reach parent at {}", addr), e))?;
    writeln!(stream, "{}", token)
        .and_then(|_| stream.flush())
        .map_err(|e| UpdateError::process_io("cannot send readiness token", e))?;

    debug!("Reported readiness to {}", addr);
    Ok(())
}
