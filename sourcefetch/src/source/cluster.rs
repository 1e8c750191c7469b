//! Control-plane lookup of a HelmChart's published artifact URL.

use kube::config::{Config, KubeConfigOptions};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::{Api, Client};
use serde_json::Value;
use tracing::{debug, info};

use super::error::{ResolveError, ResolveResult};
use super::StatusUrlResolver;

/// API group of Flux source objects.
pub const SOURCE_GROUP: &str = "source.toolkit.fluxcd.io";

/// Kind of the custom resource carrying a chart's published URL.
pub const HELM_CHART_KIND: &str = "HelmChart";

/// Default API version of [`HELM_CHART_KIND`].
pub const DEFAULT_HELM_CHART_VERSION: &str = "v1beta1";

/// Reads `.status.url` from a HelmChart using the ambient kubeconfig or
/// in-cluster configuration.
#[derive(Debug, Clone)]
pub struct KubeStatusResolver {
    gvk: GroupVersionKind,
    context: Option<String>,
}

impl Default for KubeStatusResolver {
    fn default() -> Self {
        Self::new(DEFAULT_HELM_CHART_VERSION)
    }
}

impl KubeStatusResolver {
    /// Resolve against the given HelmChart API version.
    pub fn new(version: &str) -> Self {
        Self {
            gvk: GroupVersionKind::gvk(SOURCE_GROUP, version, HELM_CHART_KIND),
            context: None,
        }
    }

    /// Use a named kubeconfig context instead of the current one.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn group_version_kind(&self) -> &GroupVersionKind {
        &self.gvk
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    async fn client(&self) -> ResolveResult<Client> {
        let Some(context) = &self.context else {
            return Client::try_default().await.map_err(ResolveError::Client);
        };

        let options = KubeConfigOptions {
            context: Some(context.clone()),
            ..Default::default()
        };
        let config = Config::from_kubeconfig(&options)
            .await
            .map_err(ResolveError::Kubeconfig)?;
        Client::try_from(config).map_err(ResolveError::Client)
    }

    async fn get(&self, namespace: &str, name: &str) -> ResolveResult<DynamicObject> {
        let client = self.client().await?;
        let resource = ApiResource::from_gvk(&self.gvk);
        let api: Api<DynamicObject> = Api::namespaced_with(client, namespace, &resource);

        api.get(name).await.map_err(|source| ResolveError::Get {
            kind: self.gvk.kind.clone(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            source,
        })
    }
}

impl StatusUrlResolver for KubeStatusResolver {
    fn status_url(&self, namespace: &str, name: &str) -> ResolveResult<String> {
        info!(
            kind = %self.gvk.kind,
            version = %self.gvk.version,
            "Getting URL from the HelmChart..."
        );

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ResolveError::Runtime)?;
        let object = runtime.block_on(self.get(namespace, name))?;

        let url = status_url_from(&object.data, namespace, name)?;
        debug!(url = %url, "Published artifact URL");
        Ok(url)
    }
}

/// Extract `.status.url` from an object's untyped body.
pub(crate) fn status_url_from(data: &Value, namespace: &str, name: &str) -> ResolveResult<String> {
    let not_string = |found| ResolveError::StatusUrlNotString {
        namespace: namespace.to_string(),
        name: name.to_string(),
        found,
    };

    let status = match data.get("status") {
        None | Some(Value::Null) => None,
        Some(Value::Object(status)) => Some(status),
        Some(other) => return Err(not_string(type_name(other))),
    };

    match status.and_then(|status| status.get("url")) {
        None | Some(Value::Null) => Err(ResolveError::StatusUrlMissing {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }),
        Some(Value::String(url)) => Ok(url.clone()),
        Some(other) => Err(not_string(type_name(other))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
