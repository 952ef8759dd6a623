use http::{HeaderMap, Method};

/// The transport security state of the connection a request arrived on, as
/// reported by the TLS acceptor.
#[derive(Clone, Debug, Default)]
pub struct TlsStatus {
    /// DER-encoded certificates presented by the peer.
    pub peer_certificates: Vec<Vec<u8>>,

    /// The number of presented chains that verified against the client CA pool.
    pub verified_chains: usize,
}

/// The parts of an inbound request the authorizer consumes.
#[derive(Clone, Debug, Default)]
pub struct RequestInfo {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub tls: Option<TlsStatus>,
}

/// Returns true iff the transport layer authenticated the peer: a certificate
/// was presented and at least one chain verified.
///
/// This must hold before any identity header is trusted; the headers are an
/// assertion layered on top of transport authentication, not a substitute for
/// it.
pub fn is_authenticated(tls: Option<&TlsStatus>) -> bool {
    match tls {
        Some(tls) => !tls.peer_certificates.is_empty() && tls.verified_chains > 0,
        None => false,
    }
}

// === impl RequestInfo ===

impl RequestInfo {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            tls: None,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_tls(mut self, tls: TlsStatus) -> Self {
        self.tls = Some(tls);
        self
    }
}
