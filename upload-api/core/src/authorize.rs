use crate::{
    config::AuthConfigSource,
    endpoint::is_info_endpoint,
    identity::{extract_identity, IdentityError},
    request::{is_authenticated, RequestInfo},
    review::{AccessReview, ResourceAttributes, ReviewClient},
};
use http::Method;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// The outcome of authorizing one request.
///
/// `Denied` carries a human-readable reason and covers both policy denials
/// and malformed client input. `Failed` is reserved for faults in this engine
/// or the policy service; callers must treat it as "no decision was made" and
/// must not proceed.
#[derive(Debug)]
pub enum Authorization {
    Allowed,
    Denied(String),
    Failed(anyhow::Error),
}

/// A client-input failure while reducing a request to an access review.
///
/// Every variant is the caller's fault, so the message becomes the deny
/// reason verbatim.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ReviewError {
    #[error("unknown api endpoint {0}")]
    UnknownEndpoint(String),

    #[error("unknown api group {0}")]
    UnknownGroup(String),

    #[error("unknown resource type {0}")]
    UnknownResource(String),

    #[error("unsupported HTTP method {0}")]
    UnsupportedMethod(String),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Decides, per inbound request, whether the caller may perform the requested
/// operation, delegating the policy decision to a [`ReviewClient`].
pub struct Authorizer<C, W> {
    client: C,
    config: W,
    api_group: String,
    resource: String,
    verbs: HashMap<Method, String>,
}

// === impl Authorization ===

impl Authorization {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// The deny reason, if any. Empty for allowed and failed outcomes.
    pub fn reason(&self) -> &str {
        match self {
            Self::Denied(reason) => reason,
            _ => "",
        }
    }
}

// === impl Authorizer ===

impl<C, W> Authorizer<C, W>
where
    C: ReviewClient,
    W: AuthConfigSource,
{
    pub fn new(client: C, config: W, api_group: impl Into<String>) -> Self {
        Self {
            client,
            config,
            api_group: api_group.into(),
            resource: "uploadtokenrequests".to_string(),
            verbs: HashMap::from([(Method::POST, "create".to_string())]),
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    /// Extends the method→verb table. `POST → create` is seeded by default.
    pub fn with_verb(mut self, method: Method, verb: impl Into<String>) -> Self {
        self.verbs.insert(method, verb.into());
        self
    }

    /// Authorizes one request.
    ///
    /// The transition order is fixed: the public-endpoint check runs before
    /// anything else so that no header can bypass it, then the transport
    /// authentication gate, then review construction, then delegation. Each
    /// state is terminal for the request.
    pub async fn authorize(&self, req: &RequestInfo) -> Authorization {
        // Endpoints that only describe which apis this server provides are
        // open to all callers.
        if is_info_endpoint(&req.path) {
            return Authorization::Allowed;
        }

        if !is_authenticated(req.tls.as_ref()) {
            return Authorization::Denied("request is not authenticated".to_string());
        }

        let review = match self.build_review(req) {
            Ok(review) => review,
            // A failure to build the review means the client did not properly
            // format the request; surface it as the deny reason rather than
            // as an internal error.
            Err(error) => return Authorization::Denied(error.to_string()),
        };

        match self.client.evaluate(review).await {
            Ok(verdict) if verdict.allowed => Authorization::Allowed,
            Ok(verdict) => Authorization::Denied(verdict.reason),
            Err(error) => Authorization::Failed(error),
        }
    }

    /// Reduces a protected request to an access review.
    ///
    /// The path must follow the 7-segment convention
    /// `/apis/{group}/{version}/namespaces/{namespace}/{resource}` and name
    /// the one API group and resource this server serves.
    fn build_review(&self, req: &RequestInfo) -> Result<AccessReview, ReviewError> {
        let segments: Vec<&str> = req.path.split('/').collect();
        if segments.len() != 7 {
            return Err(ReviewError::UnknownEndpoint(req.path.clone()));
        }

        let group = segments[2];
        let version = segments[3];
        let namespace = segments[5];
        let resource = segments[6];

        if group != self.api_group {
            return Err(ReviewError::UnknownGroup(group.to_string()));
        }

        if resource != self.resource {
            return Err(ReviewError::UnknownResource(resource.to_string()));
        }

        let verb = self
            .verbs
            .get(&req.method)
            .ok_or_else(|| ReviewError::UnsupportedMethod(req.method.to_string()))?;

        // Read the snapshot once so the whole request is extracted against a
        // single, consistent set of header names.
        let config = self.config.current();
        let identity = extract_identity(&req.headers, &config)?;

        debug!(user = %identity.user, groups = ?identity.groups, "Generating access review");

        Ok(AccessReview {
            identity,
            attributes: ResourceAttributes {
                namespace: namespace.to_string(),
                verb: verb.clone(),
                group: group.to_string(),
                version: version.to_string(),
                resource: resource.to_string(),
            },
        })
    }
}
