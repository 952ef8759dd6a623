use anyhow::{Context, Result};
use datamover_upload_api_core::{AccessReview, ReviewClient, Verdict};
use k8s_openapi::api::authorization::v1::{
    ResourceAttributes, SubjectAccessReview, SubjectAccessReviewSpec,
};
use kube::{api::PostParams, Api};
use tokio::time;

/// Evaluates access reviews against the cluster's `SubjectAccessReview` API.
///
/// Every review is a fresh create call; nothing is cached or retried. The
/// call is bounded by `timeout`, and an elapsed timeout propagates as an
/// error so the caller fails closed without mistaking an infrastructure fault
/// for a policy deny.
#[derive(Clone)]
pub struct SubjectAccessReviewClient {
    api: Api<SubjectAccessReview>,
    timeout: time::Duration,
}

// === impl SubjectAccessReviewClient ===

impl SubjectAccessReviewClient {
    pub fn new(client: kube::Client, timeout: time::Duration) -> Self {
        Self {
            api: Api::all(client),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl ReviewClient for SubjectAccessReviewClient {
    async fn evaluate(&self, review: AccessReview) -> Result<Verdict> {
        let sar = to_subject_access_review(review);
        let created = time::timeout(self.timeout, self.api.create(&PostParams::default(), &sar))
            .await
            .with_context(|| {
                format!("subject access review timed out after {:?}", self.timeout)
            })?
            .context("failed to create subject access review")?;

        let status = created
            .status
            .context("subject access review returned no status")?;
        Ok(Verdict {
            allowed: status.allowed,
            reason: status.reason.unwrap_or_default(),
        })
    }
}

fn to_subject_access_review(review: AccessReview) -> SubjectAccessReview {
    let AccessReview {
        identity,
        attributes,
    } = review;

    SubjectAccessReview {
        spec: SubjectAccessReviewSpec {
            user: Some(identity.user),
            groups: Some(identity.groups).filter(|groups| !groups.is_empty()),
            extra: Some(identity.extras).filter(|extras| !extras.is_empty()),
            resource_attributes: Some(ResourceAttributes {
                namespace: Some(attributes.namespace),
                verb: Some(attributes.verb),
                group: Some(attributes.group),
                version: Some(attributes.version),
                resource: Some(attributes.resource),
                ..Default::default()
            }),
            ..Default::default()
        },
        ..Default::default()
    }
}
