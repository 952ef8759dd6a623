use datamover_upload_api_core::{AuthConfigSource, HeaderConfig};
use futures::prelude::*;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::runtime::watcher;
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::watch;
use tracing::{debug, warn};

/// The ConfigMap the API server publishes its request-header authentication
/// settings in.
pub const CONFIG_MAP_NAME: &str = "extension-apiserver-authentication";

/// The namespace that ConfigMap lives in. Only it may replace the trusted
/// header names; a same-named ConfigMap in a tenant namespace must not be
/// honored.
pub const CONFIG_MAP_NAMESPACE: &str = "kube-system";

const USERNAME_HEADERS_KEY: &str = "requestheader-username-headers";
const GROUP_HEADERS_KEY: &str = "requestheader-group-headers";
const EXTRA_PREFIX_HEADERS_KEY: &str = "requestheader-extra-headers-prefix";

/// Watches the `extension-apiserver-authentication` ConfigMap in
/// `kube-system` and republishes it as [`HeaderConfig`] snapshots. Events for
/// same-named ConfigMaps in other namespaces are discarded.
///
/// Each observed change replaces the snapshot wholesale through a watch
/// channel, so concurrent readers see either the previous or the new value,
/// never a mixture.
#[derive(Clone, Debug)]
pub struct AuthConfigWatcher {
    rx: watch::Receiver<Arc<HeaderConfig>>,
}

// === impl AuthConfigWatcher ===

impl AuthConfigWatcher {
    /// Spawns a task folding `events` into snapshots. Until the first event
    /// arrives, readers observe the default header names.
    pub fn spawn(
        events: impl Stream<Item = watcher::Event<ConfigMap>> + Send + 'static,
    ) -> Self {
        let (tx, rx) = watch::channel(Arc::new(HeaderConfig::default()));
        tokio::spawn(Self::process(events, tx));
        Self { rx }
    }

    async fn process(
        events: impl Stream<Item = watcher::Event<ConfigMap>>,
        tx: watch::Sender<Arc<HeaderConfig>>,
    ) {
        tokio::pin!(events);
        while let Some(ev) = events.next().await {
            let config = match ev {
                watcher::Event::Apply(cm) | watcher::Event::InitApply(cm) => {
                    if !from_trusted_namespace(&cm) {
                        warn!(
                            namespace = ?cm.metadata.namespace,
                            "Ignoring auth ConfigMap outside {CONFIG_MAP_NAMESPACE}"
                        );
                        continue;
                    }
                    header_config_from(&cm)
                }
                watcher::Event::Delete(cm) => {
                    if !from_trusted_namespace(&cm) {
                        continue;
                    }
                    warn!("Auth ConfigMap deleted; restoring default header names");
                    HeaderConfig::default()
                }
                watcher::Event::Init | watcher::Event::InitDone => continue,
            };

            tx.send_if_modified(|current| {
                if **current == config {
                    return false;
                }
                debug!(?config, "Updating auth header config");
                *current = Arc::new(config);
                true
            });
        }
    }
}

impl AuthConfigSource for AuthConfigWatcher {
    fn current(&self) -> Arc<HeaderConfig> {
        self.rx.borrow().clone()
    }
}

fn from_trusted_namespace(cm: &ConfigMap) -> bool {
    cm.metadata.namespace.as_deref() == Some(CONFIG_MAP_NAMESPACE)
}

fn header_config_from(cm: &ConfigMap) -> HeaderConfig {
    let defaults = HeaderConfig::default();
    let Some(data) = cm.data.as_ref() else {
        return defaults;
    };

    HeaderConfig {
        user_headers: header_names(data, USERNAME_HEADERS_KEY)
            .unwrap_or(defaults.user_headers),
        group_headers: header_names(data, GROUP_HEADERS_KEY)
            .unwrap_or(defaults.group_headers),
        extra_prefix_headers: header_names(data, EXTRA_PREFIX_HEADERS_KEY)
            .unwrap_or(defaults.extra_prefix_headers),
    }
}

/// Reads a JSON string array from the ConfigMap. A missing or malformed value
/// falls back to the defaults rather than wedging authorization.
fn header_names(data: &BTreeMap<String, String>, key: &str) -> Option<Vec<String>> {
    let raw = data.get(key)?;
    match serde_json::from_str(raw) {
        Ok(names) => Some(names),
        Err(error) => {
            warn!(%error, key, "Ignoring malformed header name list");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn config_map_in(namespace: &str, data: &[(&str, &str)]) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(CONFIG_MAP_NAME.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    fn config_map(data: &[(&str, &str)]) -> ConfigMap {
        config_map_in(CONFIG_MAP_NAMESPACE, data)
    }

    #[test]
    fn parses_request_header_lists() {
        let cm = config_map(&[
            (USERNAME_HEADERS_KEY, r#"["X-Remote-User","X-Auth-User"]"#),
            (GROUP_HEADERS_KEY, r#"["X-Remote-Group"]"#),
            (EXTRA_PREFIX_HEADERS_KEY, r#"["X-Remote-Extra-"]"#),
        ]);

        let config = header_config_from(&cm);
        assert_eq!(
            config.user_headers,
            vec!["X-Remote-User".to_string(), "X-Auth-User".to_string()]
        );
        assert_eq!(config.group_headers, vec!["X-Remote-Group".to_string()]);
        assert_eq!(
            config.extra_prefix_headers,
            vec!["X-Remote-Extra-".to_string()]
        );
    }

    #[test]
    fn malformed_values_fall_back_to_defaults() {
        let cm = config_map(&[
            (USERNAME_HEADERS_KEY, "not json"),
            (GROUP_HEADERS_KEY, r#"["X-Custom-Group"]"#),
        ]);

        let config = header_config_from(&cm);
        assert_eq!(config.user_headers, HeaderConfig::default().user_headers);
        assert_eq!(config.group_headers, vec!["X-Custom-Group".to_string()]);
    }

    #[test]
    fn missing_data_yields_defaults() {
        assert_eq!(
            header_config_from(&ConfigMap::default()),
            HeaderConfig::default()
        );
    }

    #[tokio::test]
    async fn foreign_namespace_configmap_is_ignored() {
        let cm = config_map_in(
            "attacker",
            &[(USERNAME_HEADERS_KEY, r#"["X-Attacker-Chosen"]"#)],
        );
        let (tx, rx) = watch::channel(Arc::new(HeaderConfig::default()));

        AuthConfigWatcher::process(futures::stream::iter(vec![watcher::Event::Apply(cm)]), tx)
            .await;
        assert_eq!(*rx.borrow().clone(), HeaderConfig::default());
    }

    #[tokio::test]
    async fn foreign_namespace_deletion_keeps_the_snapshot() {
        let trusted = config_map(&[(USERNAME_HEADERS_KEY, r#"["X-Custom-User"]"#)]);
        let foreign = config_map_in("attacker", &[]);
        let (tx, rx) = watch::channel(Arc::new(HeaderConfig::default()));
        let events = futures::stream::iter(vec![
            watcher::Event::Apply(trusted),
            watcher::Event::Delete(foreign),
        ]);

        AuthConfigWatcher::process(events, tx).await;
        assert_eq!(
            rx.borrow().user_headers,
            vec!["X-Custom-User".to_string()]
        );
    }

    #[tokio::test]
    async fn deletion_restores_defaults() {
        let cm = config_map(&[(USERNAME_HEADERS_KEY, r#"["X-Custom-User"]"#)]);
        let (tx, rx) = watch::channel(Arc::new(HeaderConfig::default()));
        let events = futures::stream::iter(vec![
            watcher::Event::Apply(cm.clone()),
            watcher::Event::Delete(cm),
        ]);

        AuthConfigWatcher::process(events, tx).await;
        assert_eq!(*rx.borrow().clone(), HeaderConfig::default());
    }

    #[tokio::test]
    async fn snapshots_replace_wholesale() {
        let (tx, rx) = watch::channel(Arc::new(HeaderConfig::default()));
        let source = AuthConfigWatcher { rx };

        // A snapshot taken before an update keeps the names it was read with.
        let before = source.current();
        let cm = config_map(&[(USERNAME_HEADERS_KEY, r#"["X-Custom-User"]"#)]);
        AuthConfigWatcher::process(futures::stream::iter(vec![watcher::Event::Apply(cm)]), tx)
            .await;

        assert_eq!(before.user_headers, vec!["X-Remote-User".to_string()]);
        assert_eq!(
            source.current().user_headers,
            vec!["X-Custom-User".to_string()]
        );
    }
}
