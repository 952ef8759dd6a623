use crate::identity::Identity;
use anyhow::Result;

/// The resource coordinates of an access review.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceAttributes {
    pub namespace: String,
    pub verb: String,
    pub group: String,
    pub version: String,
    pub resource: String,
}

/// A structured access query: who is asking to do what to which resource.
///
/// Built once per request and consumed exactly once by the review client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessReview {
    pub identity: Identity,
    pub attributes: ResourceAttributes,
}

/// The policy service's answer to an access review.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Verdict {
    pub allowed: bool,

    /// Populated only when not allowed.
    pub reason: String,
}

/// Delegates access reviews to the external policy service.
///
/// Each review gets a fresh evaluation; implementations must not cache or
/// retry. A transport or service failure propagates as an error and is never
/// interpreted as a deny.
#[async_trait::async_trait]
pub trait ReviewClient {
    async fn evaluate(&self, review: AccessReview) -> Result<Verdict>;
}
