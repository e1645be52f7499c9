//! Purpose: Perform the HTTP exchange for a command and route the outcome.
//! Exports: `Executor`, `Transport`, `HttpExecutor`, `UreqTransport`, `CancelToken`.
//! Role: The only place that decides between `set_response` and error classification.
//! Invariants: `set_response` is called only for 2xx responses, at most once per execute.
//! Invariants: Transport failures surface as `ErrorKind::Transport`, never a status kind.
//! Invariants: No retries, no failover, no background threads; execute blocks the caller.
//! Invariants: A cancelled exchange never hands its body to the command.
#![allow(clippy::result_large_err)]

use super::command::{NotFoundPolicy, RavenCommand};
use crate::core::error::{ApiResult, Error, ErrorKind, classify};
use crate::core::http::{HttpRequest, HttpResponse};
use crate::core::node::ServerNode;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use ureq::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use ureq::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use ureq::rustls::{DigitallySignedStruct, Error as TlsError, SignatureScheme};

/// Runs one command against one node.
pub trait Executor: Send + Sync {
    fn execute(&self, command: &mut dyn RavenCommand, node: &ServerNode) -> ApiResult<()>;
}

/// Moves bytes. Any status code is a successful send; only a missing
/// response is an error.
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> ApiResult<HttpResponse>;
}

#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

pub struct HttpExecutor<T = UreqTransport> {
    transport: T,
    cancel: Option<CancelToken>,
}

impl HttpExecutor<UreqTransport> {
    pub fn new() -> Self {
        Self::with_transport(UreqTransport::new())
    }
}

impl Default for HttpExecutor<UreqTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> HttpExecutor<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            cancel: None,
        }
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn ensure_not_cancelled(&self, url: &str) -> ApiResult<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => {
                warn!(url, "command cancelled");
                Err(Error::new(ErrorKind::Transport)
                    .with_message("request cancelled")
                    .with_url(url))
            }
            _ => Ok(()),
        }
    }
}

impl<T: Transport> Executor for HttpExecutor<T> {
    fn execute(&self, command: &mut dyn RavenCommand, node: &ServerNode) -> ApiResult<()> {
        let request = command.create_request(node)?;
        self.ensure_not_cancelled(&request.url)?;

        debug!(
            method = request.method.as_str(),
            url = %request.url,
            read = command.is_read_request(),
            "sending command"
        );
        let response = self.transport.send(&request).inspect_err(|err| {
            warn!(url = %request.url, error = %err, "command transport failed");
        })?;
        self.ensure_not_cancelled(&request.url)?;
        debug!(status = response.status, url = %request.url, "received response");

        if response.is_success() {
            return command.set_response(&response.body, false);
        }
        if response.status == 404 && command.not_found_policy() == NotFoundPolicy::Absent {
            return Ok(());
        }
        Err(classify(response.status, &request.url, &response.body))
    }
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, command: &mut dyn RavenCommand, node: &ServerNode) -> ApiResult<()> {
        (**self).execute(command, node)
    }
}

#[derive(Debug)]
struct AcceptAllServerCertVerifier;

impl ServerCertVerifier for AcceptAllServerCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        ureq::rustls::crypto::aws_lc_rs::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Blocking transport over a shared `ureq` agent.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    tls_config: Option<Arc<ureq::rustls::ClientConfig>>,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
            timeout: None,
            connect_timeout: None,
            tls_config: None,
        }
    }

    /// Bounds the whole exchange; cancellation cannot interrupt a call sooner.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self.rebuild()
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self.rebuild()
    }

    pub fn with_tls_ca_file(mut self, path: impl AsRef<Path>) -> ApiResult<Self> {
        let path = path.as_ref();
        let cert_bytes = std::fs::read(path).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!(
                    "failed to read TLS CA/certificate file {}",
                    path.display()
                ))
                .with_source(err)
        })?;
        let mut cert_reader = Cursor::new(cert_bytes);
        let certs = rustls_pemfile::certs(&mut cert_reader)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!(
                        "failed to parse TLS CA/certificate file {}",
                        path.display()
                    ))
                    .with_source(err)
            })?;
        if certs.is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message(format!(
                "TLS CA/certificate file {} contains no certificates",
                path.display()
            )));
        }

        let _ = ureq::rustls::crypto::aws_lc_rs::default_provider().install_default();
        let mut root_store = ureq::rustls::RootCertStore::empty();
        let (added, _) = root_store.add_parsable_certificates(certs);
        if added == 0 {
            return Err(Error::new(ErrorKind::Usage).with_message(format!(
                "TLS CA/certificate file {} contains no parsable certificates",
                path.display()
            )));
        }

        let tls_config = ureq::rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();
        self.tls_config = Some(Arc::new(tls_config));
        Ok(self.rebuild())
    }

    pub fn with_tls_skip_verify(mut self) -> Self {
        let _ = ureq::rustls::crypto::aws_lc_rs::default_provider().install_default();
        let tls_config = ureq::rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAllServerCertVerifier))
            .with_no_client_auth();
        self.tls_config = Some(Arc::new(tls_config));
        self.rebuild()
    }

    fn rebuild(mut self) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = self.connect_timeout {
            builder = builder.timeout_connect(timeout);
        }
        if let Some(tls_config) = &self.tls_config {
            builder = builder.tls_config(Arc::clone(tls_config));
        }
        self.agent = builder.build();
        self
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> ApiResult<HttpResponse> {
        let mut call = self
            .agent
            .request(request.method.as_str(), &request.url)
            .set("Accept", "application/json");
        for (name, value) in &request.headers {
            call = call.set(name, value);
        }
        let response = match &request.body {
            Some(body) => call.send_bytes(body),
            None => call.call(),
        };

        match response {
            Ok(resp) => read_response(&request.url, resp),
            Err(ureq::Error::Status(_, resp)) => read_response(&request.url, resp),
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Transport)
                .with_message("request failed")
                .with_url(&request.url)
                .with_source(err)),
        }
    }
}

fn read_response(url: &str, response: ureq::Response) -> ApiResult<HttpResponse> {
    let status = response.status();
    let mut body = Vec::new();
    response.into_reader().read_to_end(&mut body).map_err(|err| {
        Error::new(ErrorKind::Transport)
            .with_message("failed to read response body")
            .with_url(url)
            .with_status(status)
            .with_source(err)
    })?;
    Ok(HttpResponse { status, body })
}
