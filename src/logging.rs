//! Logger setup and secret redaction.
//!
//! Logging is configured from CLI flags backed by `GOK_LOG_LEVEL`,
//! `GOK_LOG_FORMAT` and `GOK_LOG_NO_COLOR`. Two formats exist: a
//! human-oriented console format and JSON for machine consumption. All log
//! output goes to stderr.
//!
//! Secret values loaded for a render pass are registered with the global
//! [`Redactor`]; the stderr sink replaces any registered byte substring with
//! a fixed mask before it leaves the process. This is defense in depth: the
//! renderer still avoids logging secret values directly, the writer only
//! catches accidents.

use std::io::{self, Write};
use std::sync::{Arc, OnceLock, RwLock};

use tracing_subscriber::EnvFilter;

/// Mask substituted for registered sensitive values.
const MASK: &[u8] = b"********";

/// Logging configuration, typically sourced from CLI flags / environment.
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Level filter: `trace`, `debug`, `info`, `warn`, `error`.
    pub level: String,
    /// Output format: `console` or `json`.
    pub format: String,
    /// Disable ANSI colors in console output.
    pub no_color: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "console".to_string(),
            no_color: false,
        }
    }
}

/// Process-wide registry of sensitive byte strings.
///
/// The registry is consulted on every write, so secrets registered after
/// logger initialization (they are only known once the secrets file has been
/// parsed) are still masked.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    sensitive: Arc<RwLock<Vec<Vec<u8>>>>,
}

impl Redactor {
    /// The registry used by the stderr sink.
    pub fn global() -> &'static Redactor {
        static GLOBAL: OnceLock<Redactor> = OnceLock::new();
        GLOBAL.get_or_init(Redactor::default)
    }

    /// Register sensitive strings. Empty strings are ignored.
    pub fn add_secrets<I, S>(&self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut guard = self.sensitive.write().expect("redactor lock poisoned");
        for value in values {
            let value = value.into();
            if !value.is_empty() {
                guard.push(value.into_bytes());
            }
        }
    }

    /// Replace every occurrence of a registered value in `buf` with the mask.
    #[must_use]
    pub fn redact(&self, buf: &[u8]) -> Vec<u8> {
        let guard = self.sensitive.read().expect("redactor lock poisoned");
        let mut out = buf.to_vec();
        for secret in guard.iter() {
            out = replace_all(&out, secret, MASK);
        }
        out
    }

    #[cfg(test)]
    fn clear(&self) {
        self.sensitive.write().expect("redactor lock poisoned").clear();
    }
}

fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return haystack.to_vec();
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(needle) {
            out.extend_from_slice(replacement);
            i += needle.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}

/// Writer that masks registered secrets before forwarding to the wrapped
/// sink.
pub struct RedactingWriter<W: Write> {
    inner: W,
    redactor: Redactor,
}

impl<W: Write> RedactingWriter<W> {
    /// Wrap `inner`, masking values registered with `redactor`.
    pub fn new(inner: W, redactor: Redactor) -> Self {
        Self { inner, redactor }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let redacted = self.redactor.redact(buf);
        self.inner.write_all(&redacted)?;
        // report the original length: the caller's view of `buf` is unchanged
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Initialize the global tracing subscriber.
///
/// Unknown levels or formats fall back to `info` / `console`; the fallback
/// is logged as a warning once the subscriber is installed.
pub fn init(opts: &LogOptions) {
    let mut queued_warnings = Vec::new();

    let level = opts.level.to_lowercase();
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| {
        queued_warnings.push(format!("invalid log level {level:?}, using info"));
        EnvFilter::new("info")
    });

    let make_writer = || RedactingWriter::new(io::stderr(), Redactor::global().clone());

    let format = opts.format.to_lowercase();
    if format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(make_writer)
            .init();
    } else {
        if format != "console" {
            queued_warnings.push(format!("unknown log format {format:?}, using console"));
        }
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(!opts.no_color)
            .with_target(false)
            .with_writer(make_writer)
            .init();
    }

    for warning in queued_warnings {
        tracing::warn!("{warning}");
    }
}
