use crate::service::{AuthGate, NotImplemented};
use anyhow::{bail, Result};
use clap::Parser;
use datamover_upload_api_core::Authorizer;
use datamover_upload_api_k8s::{
    AuthConfigWatcher, SubjectAccessReviewClient, CONFIG_MAP_NAME, CONFIG_MAP_NAMESPACE,
};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use std::{sync::Arc, time::Duration};

#[derive(Debug, Parser)]
#[clap(name = "upload-api", about = "Authorizes upload token requests")]
pub struct Args {
    #[clap(
        long,
        default_value = "upload_api=info,warn",
        env = "DATAMOVER_UPLOAD_API_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    server: kubert::ServerArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// The API group this server serves.
    #[clap(long, default_value = "upload.datamover.io")]
    api_group: String,

    /// The resource kind this server serves.
    #[clap(long, default_value = "uploadtokenrequests")]
    resource: String,

    /// Bound on each subject access review call.
    #[clap(long, default_value = "15000")]
    review_timeout_ms: u64,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            server,
            api_group,
            resource,
            review_timeout_ms,
        } = self;

        let mut prom = <Registry>::default();
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .with_optional_server(Some(server))
            .build()
            .await?;

        // Watch the API server's request-header authentication settings; the
        // authorizer reads the latest snapshot on every request. The selector
        // pins the watch to the kube-system ConfigMap; the watcher itself
        // also drops events from any other namespace.
        let auth_configs = runtime.watch_all::<ConfigMap>(watcher::Config::default().fields(
            &format!("metadata.namespace={CONFIG_MAP_NAMESPACE},metadata.name={CONFIG_MAP_NAME}"),
        ));
        let auth_config = AuthConfigWatcher::spawn(auth_configs);

        let reviews = SubjectAccessReviewClient::new(
            runtime.client(),
            Duration::from_millis(review_timeout_ms),
        );
        let authorizer =
            Arc::new(Authorizer::new(reviews, auth_config, api_group).with_resource(resource));

        let runtime = runtime.spawn_server({
            let authorizer = authorizer.clone();
            move || AuthGate::new(authorizer.clone(), NotImplemented::default())
        });

        // Block the main thread on the shutdown signal. Once it fires, wait
        // for the background tasks to complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
