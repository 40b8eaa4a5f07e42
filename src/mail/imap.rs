//! Minimal IMAP4rev1 client over rustls, covering what the watcher needs:
//! LOGIN, SELECT, IDLE, UID SEARCH and UID FETCH.
//!
//! The connection is blocking. `ImapMailbox` moves it onto the blocking
//! pool for each call so the async runtime never stalls on a socket read.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use super::{Mailbox, RawMessage};
use crate::config::MailConfig;
use crate::error::MailError;

/// Socket read timeout once the session is established.
const READ_POLL: Duration = Duration::from_secs(60);

/// Re-issue IDLE before the server's 29-minute inactivity cutoff.
const IDLE_REFRESH: Duration = Duration::from_secs(25 * 60);

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// One server response, with any `{n}` literals pulled out of the text.
#[derive(Debug, Default)]
struct Response {
    line: String,
    literals: Vec<Vec<u8>>,
}

/// An authenticated IMAP session with a mailbox selected.
pub struct ImapConnection<S = TlsStream> {
    stream: S,
    buf: Vec<u8>,
    next_tag: u32,
    /// `EXISTS` seen while a command was running, not yet reported by `idle`.
    pending_exists: bool,
}

impl ImapConnection {
    /// Connect, log in and select the configured mailbox.
    pub fn connect(config: &MailConfig) -> Result<Self, MailError> {
        let addr = (config.imap_host.as_str(), config.imap_port)
            .to_socket_addrs()
            .map_err(io_error)?
            .next()
            .ok_or_else(|| {
                MailError::Connection(format!("could not resolve {}", config.imap_host))
            })?;

        let tcp = TcpStream::connect_timeout(&addr, config.auth_timeout).map_err(io_error)?;
        tcp.set_read_timeout(Some(config.auth_timeout)).map_err(io_error)?;
        tcp.set_write_timeout(Some(config.auth_timeout)).map_err(io_error)?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name = rustls::pki_types::ServerName::try_from(config.imap_host.clone())
            .map_err(|e| MailError::Connection(format!("invalid IMAP host: {e}")))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| MailError::Connection(format!("TLS setup failed: {e}")))?;

        let mut session = Self::open(
            rustls::StreamOwned::new(conn, tcp),
            &config.address,
            config.password.expose_secret(),
            &config.mailbox,
        )?;

        session
            .stream
            .sock
            .set_read_timeout(Some(READ_POLL))
            .map_err(io_error)?;

        Ok(session)
    }
}

impl<S: Read + Write> ImapConnection<S> {
    /// Read the greeting, log in and select `mailbox`.
    fn open(stream: S, user: &str, password: &str, mailbox: &str) -> Result<Self, MailError> {
        let mut session = Self {
            stream,
            buf: Vec::new(),
            next_tag: 1,
            pending_exists: false,
        };

        let greeting = session.read_response().map_err(io_error)?;
        if !greeting.line.starts_with("* OK") && !greeting.line.starts_with("* PREAUTH") {
            return Err(MailError::Connection(format!(
                "unexpected greeting: {}",
                greeting.line
            )));
        }

        session.command(&format!("LOGIN {} {}", quote(user), quote(password)))?;
        session.command(&format!("SELECT {}", quote(mailbox)))?;
        // SELECT reports the current message count, not new mail.
        session.pending_exists = false;

        Ok(session)
    }

    /// UIDs of unread messages from `sender`.
    pub fn search_unseen_from(&mut self, sender: &str) -> Result<Vec<u32>, MailError> {
        let responses = self.command(&format!("UID SEARCH UNSEEN FROM {}", quote(sender)))?;
        Ok(responses
            .iter()
            .flat_map(|r| parse_search(&r.line))
            .collect())
    }

    /// Fetch full messages by UID. `BODY[]` (not `BODY.PEEK[]`) sets `\Seen`.
    pub fn fetch(&mut self, uids: &[u32]) -> Result<Vec<RawMessage>, MailError> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let set = uids
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let responses = self.command(&format!("UID FETCH {set} (UID BODY[])"))?;

        Ok(responses
            .into_iter()
            .filter_map(|mut r| {
                let uid = parse_fetch_uid(&r.line)?;
                if r.literals.is_empty() {
                    return None;
                }
                Some(RawMessage {
                    uid,
                    bytes: r.literals.swap_remove(0),
                })
            })
            .collect())
    }

    /// Block in IDLE until the server reports a new message (`* n EXISTS`).
    ///
    /// Returns at once if an `EXISTS` arrived during an earlier command.
    pub fn idle(&mut self) -> Result<(), MailError> {
        if std::mem::take(&mut self.pending_exists) {
            debug!("New mail arrived outside IDLE");
            return Ok(());
        }
        loop {
            let tag = self.tag();
            self.write_line(&format!("{tag} IDLE"))?;

            let mut signalled = false;
            loop {
                let resp = self.read_response().map_err(io_error)?;
                if resp.line.starts_with('+') {
                    break;
                }
                if resp.line.starts_with(&tag) {
                    return Err(MailError::Connection(format!(
                        "IDLE rejected: {}",
                        resp.line
                    )));
                }
                signalled |= is_exists(&resp.line);
            }

            let started = Instant::now();
            while !signalled {
                match self.read_response() {
                    Ok(resp) if resp.line.starts_with("* BYE") => {
                        return Err(MailError::Connection(format!(
                            "server closed the session: {}",
                            resp.line
                        )));
                    }
                    Ok(resp) => signalled = is_exists(&resp.line),
                    Err(e) if is_timeout(&e) => {
                        if started.elapsed() >= IDLE_REFRESH {
                            debug!("Refreshing IMAP IDLE");
                            break;
                        }
                    }
                    Err(e) => return Err(io_error(e)),
                }
            }

            self.write_line("DONE")?;
            loop {
                let resp = self.read_response().map_err(io_error)?;
                if let Some(rest) = resp.line.strip_prefix(&format!("{tag} ")) {
                    if !rest.starts_with("OK") {
                        return Err(MailError::Connection(format!("IDLE ended with: {rest}")));
                    }
                    break;
                }
                signalled |= is_exists(&resp.line);
            }

            if signalled {
                return Ok(());
            }
        }
    }

    /// Send a tagged command and collect untagged responses until its completion.
    fn command(&mut self, cmd: &str) -> Result<Vec<Response>, MailError> {
        let tag = self.tag();
        // Never echo arguments: LOGIN carries the password.
        let words = if cmd.starts_with("UID ") { 2 } else { 1 };
        let verb = cmd.split_whitespace().take(words).collect::<Vec<_>>().join(" ");
        self.write_line(&format!("{tag} {cmd}"))?;

        let prefix = format!("{tag} ");
        let mut untagged = Vec::new();
        loop {
            let resp = self.read_response().map_err(io_error)?;
            if let Some(rest) = resp.line.strip_prefix(&prefix) {
                if rest.starts_with("OK") {
                    return Ok(untagged);
                }
                return Err(MailError::Connection(format!("{verb} rejected: {rest}")));
            }
            self.pending_exists |= is_exists(&resp.line);
            untagged.push(resp);
        }
    }

    fn tag(&mut self) -> String {
        let tag = format!("A{}", self.next_tag);
        self.next_tag += 1;
        tag
    }

    fn write_line(&mut self, line: &str) -> Result<(), MailError> {
        self.stream
            .write_all(format!("{line}\r\n").as_bytes())
            .and_then(|_| self.stream.flush())
            .map_err(io_error)
    }

    fn read_response(&mut self) -> io::Result<Response> {
        let mut resp = Response::default();
        loop {
            let raw = self.read_line()?;
            let text = String::from_utf8_lossy(&raw);
            let text = text.trim_end_matches(['\r', '\n']);
            resp.line.push_str(text);
            match literal_len(text) {
                Some(n) => resp.literals.push(self.read_exact_bytes(n)?),
                None => return Ok(resp),
            }
        }
    }

    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        loop {
            if let Some(pos) = self.buf.windows(2).position(|w| w == b"\r\n") {
                return Ok(self.buf.drain(..pos + 2).collect());
            }
            self.fill()?;
        }
    }

    fn read_exact_bytes(&mut self, n: usize) -> io::Result<Vec<u8>> {
        while self.buf.len() < n {
            self.fill()?;
        }
        Ok(self.buf.drain(..n).collect())
    }

    fn fill(&mut self) -> io::Result<()> {
        let mut chunk = [0u8; 4096];
        match self.stream.read(&mut chunk)? {
            0 => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "IMAP connection closed",
            )),
            n => {
                self.buf.extend_from_slice(&chunk[..n]);
                Ok(())
            }
        }
    }
}

fn io_error(e: io::Error) -> MailError {
    MailError::Connection(e.to_string())
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Quote a string for use as an IMAP quoted-string.
pub fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Length of a literal announced at the end of a line (`{n}` or `{n+}`).
fn literal_len(line: &str) -> Option<usize> {
    let inner = line.strip_suffix('}')?;
    let open = inner.rfind('{')?;
    inner[open + 1..].trim_end_matches('+').parse().ok()
}

/// UIDs from a `* SEARCH ...` response line.
fn parse_search(line: &str) -> Vec<u32> {
    match line.strip_prefix("* SEARCH") {
        Some(rest) => rest
            .split_whitespace()
            .filter_map(|t| t.parse().ok())
            .collect(),
        None => Vec::new(),
    }
}

/// UID item from a `* n FETCH (...)` response line.
fn parse_fetch_uid(line: &str) -> Option<u32> {
    if !line.starts_with("* ") || !line.contains(" FETCH ") {
        return None;
    }
    let tokens: Vec<&str> = line
        .split(|c: char| c.is_whitespace() || c == '(' || c == ')')
        .filter(|t| !t.is_empty())
        .collect();
    tokens
        .windows(2)
        .find(|w| w[0].eq_ignore_ascii_case("UID"))
        .and_then(|w| w[1].parse().ok())
}

fn is_exists(line: &str) -> bool {
    line.starts_with("* ") && line.ends_with(" EXISTS")
}

// ── Async adapter ───────────────────────────────────────────────────

/// The live `Mailbox`: an `ImapConnection` driven from the blocking pool.
pub struct ImapMailbox {
    conn: Option<ImapConnection>,
}

impl ImapMailbox {
    /// Open the persistent connection and select the primary folder.
    pub async fn connect(config: MailConfig) -> Result<Self, MailError> {
        info!("Signing in as {}", config.address);
        let address = config.address.clone();
        let conn = tokio::task::spawn_blocking(move || ImapConnection::connect(&config))
            .await
            .map_err(|e| MailError::Connection(format!("IMAP connect task panicked: {e}")))??;
        info!("Successfully signed into {address}");
        Ok(Self { conn: Some(conn) })
    }

    async fn with_conn<T, F>(&mut self, f: F) -> Result<T, MailError>
    where
        T: Send + 'static,
        F: FnOnce(&mut ImapConnection) -> Result<T, MailError> + Send + 'static,
    {
        let mut conn = self
            .conn
            .take()
            .ok_or_else(|| MailError::Connection("mailbox connection lost".into()))?;
        let (conn, result) = tokio::task::spawn_blocking(move || {
            let result = f(&mut conn);
            (conn, result)
        })
        .await
        .map_err(|e| MailError::Connection(format!("IMAP task panicked: {e}")))?;
        self.conn = Some(conn);
        result
    }
}

#[async_trait]
impl Mailbox for ImapMailbox {
    async fn wait_for_mail(&mut self) -> Result<(), MailError> {
        self.with_conn(|conn| conn.idle()).await
    }

    async fn fetch_unseen_from(&mut self, sender: &str) -> Result<Vec<RawMessage>, MailError> {
        let sender = sender.to_string();
        self.with_conn(move |conn| {
            let uids = conn.search_unseen_from(&sender)?;
            if uids.is_empty() {
                return Ok(Vec::new());
            }
            let messages = conn.fetch(&uids)?;
            if messages.len() != uids.len() {
                warn!(
                    searched = uids.len(),
                    fetched = messages.len(),
                    "Some searched messages were not returned by FETCH"
                );
            }
            Ok(messages)
        })
        .await
    }
}
