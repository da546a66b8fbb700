use std::io::Write;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use ssh2::{ErrorCode, Session};
use tracing::{debug, info, instrument};

use crate::error::{DeliveryError, Result};
use crate::request::DeliveryRequest;

pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// libssh2 session error codes that mean the socket went away rather than the
// server saying no.
const LIBSSH2_ERROR_SOCKET_SEND: i32 = -7;
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;
const LIBSSH2_ERROR_SOCKET_DISCONNECT: i32 = -13;
const LIBSSH2_ERROR_SOCKET_TIMEOUT: i32 = -30;
const LIBSSH2_ERROR_SOCKET_RECV: i32 = -43;

/// One authenticated remote file copy.
///
/// Implementations make exactly one attempt; retrying is the caller's call.
#[async_trait]
pub trait TransferClient: Send + Sync {
    async fn deliver(&self, request: &DeliveryRequest) -> Result<()>;
}

/// SFTP over SSH with password authentication only.
///
/// libssh2 is blocking, so each delivery runs on the blocking thread pool.
/// The connect timeout also bounds every blocking call of the session.
#[derive(Debug, Clone)]
pub struct SftpClient {
    port: u16,
    connect_timeout: Duration,
}

impl Default for SftpClient {
    fn default() -> Self {
        Self::new(DEFAULT_PORT, DEFAULT_CONNECT_TIMEOUT)
    }
}

impl SftpClient {
    pub fn new(port: u16, connect_timeout: Duration) -> Self {
        Self {
            port,
            connect_timeout,
        }
    }
}

#[async_trait]
impl TransferClient for SftpClient {
    #[instrument(skip(self, request), fields(host = %request.host, file = %request.remote_filename))]
    async fn deliver(&self, request: &DeliveryRequest) -> Result<()> {
        let request = request.trimmed();
        let port = self.port;
        let timeout = self.connect_timeout;

        tokio::task::spawn_blocking(move || deliver_blocking(&request, port, timeout))
            .await
            .map_err(|e| DeliveryError::Transfer(format!("delivery task aborted: {e}")))?
    }
}

/// Disconnects the SSH session on every exit path.
struct SessionGuard(Session);

impl Deref for SessionGuard {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.0
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Session {
        &mut self.0
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Err(e) = self.0.disconnect(None, "delivery finished", None) {
            debug!("ssh disconnect: {e}");
        }
    }
}

fn deliver_blocking(request: &DeliveryRequest, port: u16, timeout: Duration) -> Result<()> {
    let payload = std::fs::read(&request.local_path).map_err(|e| {
        DeliveryError::Transfer(format!(
            "cannot read local file {}: {e}",
            request.local_path.display()
        ))
    })?;

    let session = open_session(&request.host, port, timeout)?;
    authenticate(&session, &request.user, &request.secret)?;

    // Declared after `session` so it is dropped (channel closed) first.
    let sftp = session
        .sftp()
        .map_err(|e| DeliveryError::Connection(format!("could not start SFTP subsystem: {e}")))?;

    let dir = request.remote_dir_or_home();
    match sftp.stat(Path::new(dir)) {
        Ok(stat) if stat.is_dir() => {}
        Ok(_) => {
            return Err(DeliveryError::Transfer(format!(
                "remote path is not a directory: {dir}"
            )))
        }
        Err(e) => {
            return Err(DeliveryError::Transfer(format!(
                "remote directory not accessible: {dir}: {e}"
            )))
        }
    }

    let target = request.remote_path();
    let mut file = sftp
        .create(Path::new(&target))
        .map_err(|e| DeliveryError::Transfer(format!("cannot create {target}: {e}")))?;
    file.write_all(&payload)
        .and_then(|_| file.flush())
        .map_err(|e| DeliveryError::Transfer(format!("write to {target} failed: {e}")))?;
    drop(file);

    info!(
        host = %request.host,
        target = %target,
        bytes = payload.len(),
        "file delivered"
    );
    Ok(())
}

fn open_session(host: &str, port: u16, timeout: Duration) -> Result<SessionGuard> {
    let tcp = connect_tcp(host, port, timeout)?;

    let mut session = Session::new()
        .map_err(|e| DeliveryError::Connection(format!("could not create SSH session: {e}")))?;
    session.set_timeout(timeout_millis(timeout));
    session.set_tcp_stream(tcp);
    let mut session = SessionGuard(session);

    session
        .handshake()
        .map_err(|e| DeliveryError::Connection(format!("SSH handshake with {host} failed: {e}")))?;
    Ok(session)
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    if host.is_empty() {
        return Err(DeliveryError::Connection("no remote host given".to_string()));
    }
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| DeliveryError::Connection(format!("cannot resolve {host}: {e}")))?
        .collect();

    let mut last_err = None;
    for addr in &addrs {
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(stream) => {
                stream
                    .set_read_timeout(Some(timeout))
                    .and_then(|_| stream.set_write_timeout(Some(timeout)))
                    .map_err(|e| DeliveryError::Connection(e.to_string()))?;
                debug!(%addr, "tcp connected");
                return Ok(stream);
            }
            Err(e) => {
                debug!(%addr, "tcp connect failed: {e}");
                last_err = Some(e);
            }
        }
    }

    Err(DeliveryError::Connection(match last_err {
        Some(e) => format!("cannot connect to {host}:{port}: {e}"),
        None => format!("{host} resolved to no addresses"),
    }))
}

/// Password authentication only: no agent, key or keyboard-interactive
/// fallback.
fn authenticate(session: &Session, user: &str, secret: &str) -> Result<()> {
    session
        .userauth_password(user, secret)
        .map_err(|e| classify_auth_error(&e))?;
    if !session.authenticated() {
        return Err(DeliveryError::Authentication(format!(
            "server did not accept the password for {user}"
        )));
    }
    Ok(())
}

/// An error from the password exchange is an authentication failure unless
/// the socket itself failed underneath it.
fn classify_auth_error(e: &ssh2::Error) -> DeliveryError {
    match e.code() {
        ErrorCode::Session(
            LIBSSH2_ERROR_SOCKET_SEND
            | LIBSSH2_ERROR_TIMEOUT
            | LIBSSH2_ERROR_SOCKET_DISCONNECT
            | LIBSSH2_ERROR_SOCKET_TIMEOUT
            | LIBSSH2_ERROR_SOCKET_RECV,
        ) => DeliveryError::Connection(format!("connection lost during authentication: {e}")),
        _ => DeliveryError::Authentication(e.to_string()),
    }
}

fn timeout_millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Instant;

    fn request(local: PathBuf, host: &str) -> DeliveryRequest {
        DeliveryRequest {
            local_path: local,
            remote_directory: "/inbox".to_string(),
            remote_filename: "report.csv".to_string(),
            host: host.to_string(),
            user: "alice".to_string(),
            secret: "hunter2".to_string(),
        }
    }

    fn payload() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"id,name\n1,alpha\n").unwrap();
        file
    }

    /// A port on loopback that nothing listens on.
    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    #[test]
    fn auth_rejection_is_authentication_error() {
        let e = ssh2::Error::new(ErrorCode::Session(-18), "Authentication failed");
        assert!(matches!(
            classify_auth_error(&e),
            DeliveryError::Authentication(_)
        ));
    }

    #[test]
    fn socket_failure_during_auth_is_connection_error() {
        let e = ssh2::Error::new(ErrorCode::Session(LIBSSH2_ERROR_SOCKET_DISCONNECT), "gone");
        assert!(matches!(classify_auth_error(&e), DeliveryError::Connection(_)));
    }

    #[test]
    fn timeout_millis_saturates() {
        assert_eq!(timeout_millis(Duration::from_secs(30)), 30_000);
        assert_eq!(timeout_millis(Duration::from_secs(u64::MAX)), u32::MAX);
    }

    #[tokio::test]
    async fn refused_connection_is_connection_error() {
        let file = payload();
        let client = SftpClient::new(closed_port(), Duration::from_secs(5));
        let err = client
            .deliver(&request(file.path().to_path_buf(), "127.0.0.1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Connection(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn unreachable_host_fails_within_timeout() {
        let file = payload();
        let timeout = Duration::from_secs(2);
        let client = SftpClient::new(22, timeout);
        let started = Instant::now();
        // TEST-NET-1 (RFC 5737) is never routed.
        let err = client
            .deliver(&request(file.path().to_path_buf(), "192.0.2.1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Connection(_)), "got {err:?}");
        assert!(started.elapsed() < timeout + Duration::from_secs(3));
    }

    #[tokio::test]
    async fn empty_host_is_connection_error() {
        let file = payload();
        let err = SftpClient::default()
            .deliver(&request(file.path().to_path_buf(), "   "))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DeliveryError::Connection("no remote host given".to_string())
        );
    }

    #[tokio::test]
    async fn missing_local_payload_is_transfer_error() {
        let client = SftpClient::new(closed_port(), Duration::from_secs(1));
        let err = client
            .deliver(&request(PathBuf::from("/nonexistent/report.csv"), "127.0.0.1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Transfer(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn non_ssh_peer_fails_handshake_as_connection_error() {
        // A listener that accepts and immediately hangs up.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                drop(stream);
            }
        });

        let file = payload();
        let client = SftpClient::new(port, Duration::from_secs(5));
        let err = client
            .deliver(&request(file.path().to_path_buf(), "127.0.0.1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Connection(_)), "got {err:?}");
    }
}
