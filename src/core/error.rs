use serde::Deserialize;
use std::error::Error as StdError;
use std::fmt;

pub type ApiResult<T> = Result<T, Error>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    NotFound,
    Conflict,
    InternalServerError,
    ServiceUnavailable,
    /// Non-2xx status with no dedicated kind.
    Request,
    /// No response was obtained (connect, timeout, framing, cancellation).
    Transport,
    /// 2xx response whose body did not match the expected shape.
    Decode,
    /// Caller input rejected before any I/O happened.
    Usage,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::InternalServerError => "InternalServerError",
            ErrorKind::ServiceUnavailable => "ServiceUnavailable",
            ErrorKind::Request => "Request",
            ErrorKind::Transport => "Transport",
            ErrorKind::Decode => "Decode",
            ErrorKind::Usage => "Usage",
        }
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    url: Option<String>,
    status: Option<u16>,
    server_type: Option<String>,
    body: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            url: None,
            status: None,
            server_type: None,
            body: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Exception type reported by the server, e.g. `Raven.Server...DatabaseDoesNotExistException`.
    pub fn server_type(&self) -> Option<&str> {
        self.server_type.as_deref()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_server_type(mut self, server_type: impl Into<String>) -> Self {
        self.server_type = Some(server_type.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.as_str())?;
        if let Some(status) = self.status {
            write!(f, " ({status})")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(url) = &self.url {
            write!(f, " (url: {url})")?;
        }
        if let Some(server_type) = &self.server_type {
            write!(f, " (type: {server_type})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServerErrorBody {
    #[serde(default, rename = "Type")]
    exception_type: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Maps a failed exchange to exactly one error kind.
///
/// Only called for non-2xx responses; a 2xx status passed here still yields
/// `ErrorKind::Request`. The body is optional context: empty or non-JSON
/// bodies fall back to a status-only classification.
pub fn classify(status: u16, url: &str, body: &[u8]) -> Error {
    let kind = error_kind_from_status(status);
    let mut err = Error::new(kind).with_status(status).with_url(url);

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return err.with_message(format!("server returned status {status}"));
    }

    match serde_json::from_str::<ServerErrorBody>(text) {
        Ok(server) => {
            let message = server.message.or(server.error).unwrap_or_else(|| match server.url {
                Some(server_url) => format!("server returned status {status} for {server_url}"),
                None => format!("server returned status {status}"),
            });
            err = err.with_message(message);
            if let Some(server_type) = server.exception_type {
                err = err.with_server_type(server_type);
            }
        }
        Err(_) => {
            err = err.with_message(format!("server returned status {status}"));
        }
    }
    if kind == ErrorKind::Request {
        err = err.with_body(text);
    }
    err
}

fn error_kind_from_status(status: u16) -> ErrorKind {
    match status {
        400 => ErrorKind::BadRequest,
        401 | 403 => ErrorKind::Unauthorized,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::Conflict,
        500 => ErrorKind::InternalServerError,
        503 => ErrorKind::ServiceUnavailable,
        _ => ErrorKind::Request,
    }
}

pub(crate) fn decode_error(what: &str, err: serde_json::Error) -> Error {
    Error::new(ErrorKind::Decode)
        .with_message(format!("invalid {what} response json"))
        .with_source(err)
}

pub(crate) fn encode_error(what: &str, err: serde_json::Error) -> Error {
    Error::new(ErrorKind::Usage)
        .with_message(format!("failed to encode {what} request json"))
        .with_source(err)
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Request => 1,
        ErrorKind::Usage => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::Conflict => 4,
        ErrorKind::ServiceUnavailable => 5,
        ErrorKind::Unauthorized => 6,
        ErrorKind::Decode => 7,
        ErrorKind::Transport => 8,
        ErrorKind::BadRequest => 9,
        ErrorKind::InternalServerError => 10,
    }
}
