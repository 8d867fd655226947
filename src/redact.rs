//! Secret redaction for log output
//!
//! Passwords, webhook URLs and API tokens are registered with a shared
//! [`Redactor`] as soon as they are read. The tracing subscriber writes through
//! [`RedactingWriter`], which buffers each formatted event and replaces every
//! registered secret with `[REDACTED]` before it reaches the terminal.

use std::io::{self, Write};
use std::sync::{Arc, RwLock};
use tracing_subscriber::fmt::MakeWriter;

pub const REDACTED: &str = "[REDACTED]";

/// Shared, cloneable set of secrets to scrub from output
#[derive(Clone, Default)]
pub struct Redactor {
    secrets: Arc<RwLock<Vec<String>>>,
}

impl Redactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a secret. Blank strings are ignored.
    pub fn redact(&self, secret: impl Into<String>) {
        let secret = secret.into();
        if secret.trim().is_empty() {
            return;
        }
        if let Ok(mut secrets) = self.secrets.write() {
            if !secrets.contains(&secret) {
                secrets.push(secret);
                // Longest first so a secret embedded in a longer one is not half-replaced
                secrets.sort_by(|a, b| b.len().cmp(&a.len()));
            }
        }
    }

    /// Register a secret URL together with the normalised form the HTTP
    /// client logs (lowercased host, escaped path) and its path alone.
    pub fn redact_url(&self, raw: &str) {
        self.redact(raw);
        if let Ok(url) = reqwest::Url::parse(raw.trim()) {
            self.redact(url.as_str());
            if url.path().len() > 1 {
                self.redact(url.path());
            }
        }
    }

    pub fn apply(&self, text: &str) -> String {
        match self.secrets.read() {
            Ok(secrets) => secrets
                .iter()
                .fold(text.to_string(), |acc, secret| acc.replace(secret, REDACTED)),
            Err(_) => text.to_string(),
        }
    }
}

/// `MakeWriter` wrapper that redacts each event before handing it to `inner`
pub struct RedactingWriter<M> {
    redactor: Redactor,
    inner: M,
}

impl<M> RedactingWriter<M> {
    pub fn new(redactor: Redactor, inner: M) -> Self {
        Self { redactor, inner }
    }
}

impl<'a, M> MakeWriter<'a> for RedactingWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = RedactedEvent<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactedEvent::new(self.redactor.clone(), self.inner.make_writer())
    }
}

/// One buffered log event. Flushed (redacted) on `flush` or drop.
pub struct RedactedEvent<W: Write> {
    redactor: Redactor,
    buffer: Vec<u8>,
    inner: W,
}

impl<W: Write> RedactedEvent<W> {
    pub fn new(redactor: Redactor, inner: W) -> Self {
        Self {
            redactor,
            buffer: Vec::new(),
            inner,
        }
    }

    fn emit(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        self.inner.write_all(self.redactor.apply(&text).as_bytes())?;
        self.inner.flush()
    }
}

impl<W: Write> Write for RedactedEvent<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.emit()
    }
}

impl<W: Write> Drop for RedactedEvent<W> {
    fn drop(&mut self) {
        let _ = self.emit();
    }
}
