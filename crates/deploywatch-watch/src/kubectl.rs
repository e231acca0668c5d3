//! `ClusterQuery` backed by the kubectl binary.

use std::path::PathBuf;
use std::process::Command;

use serde_json::Value;
use tracing::{debug, trace};

use crate::config::ClusterSection;
use crate::error::{FetchError, FetchResult};
use crate::fetcher::{ClusterQuery, ResourceKind};

/// Runs `kubectl get ... --output=json` for every query.
#[derive(Debug, Clone)]
pub struct KubectlQuery {
    binary: PathBuf,
    namespace: Option<String>,
    context: Option<String>,
}

impl KubectlQuery {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            namespace: None,
            context: None,
        }
    }

    /// Build from the `[cluster]` config section, with an optional
    /// per-workload namespace override.
    pub fn from_config(cluster: &ClusterSection, namespace: Option<&str>) -> Self {
        Self {
            binary: PathBuf::from(&cluster.kubectl),
            namespace: namespace.map(str::to_string).or_else(|| cluster.namespace.clone()),
            context: cluster.context.clone(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn get_args(&self, kind: ResourceKind, name: &str) -> Vec<String> {
        let mut args = vec![
            "get".to_string(),
            kind.as_str().to_string(),
            name.to_string(),
            "--output=json".to_string(),
        ];
        self.push_scope(&mut args);
        args
    }

    fn list_args(&self, kind: ResourceKind, selector: &str) -> Vec<String> {
        let mut args = vec![
            "get".to_string(),
            kind.as_str().to_string(),
            "--output=json".to_string(),
            format!("--selector={selector}"),
        ];
        self.push_scope(&mut args);
        args
    }

    fn push_scope(&self, args: &mut Vec<String>) {
        if let Some(ns) = &self.namespace {
            args.push(format!("--namespace={ns}"));
        }
        if let Some(ctx) = &self.context {
            args.push(format!("--context={ctx}"));
        }
    }

    /// Run kubectl. `Ok(None)` only when the server reports that `target`
    /// itself does not exist; every other failure is a transport error.
    fn run(&self, args: &[String], target: Option<(ResourceKind, &str)>) -> FetchResult<Option<Value>> {
        trace!(binary = ?self.binary, ?args, "running kubectl");
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .map_err(|e| FetchError::Transport(format!("failed to run {:?}: {e}", self.binary)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if target.is_some_and(|(kind, name)| is_not_found(&stderr, kind, name)) {
                debug!(?args, "kubectl reported resource not found");
                return Ok(None);
            }
            return Err(FetchError::Transport(format!(
                "kubectl {} exited with {}: {}",
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map(Some)
            .map_err(|e| FetchError::Transport(format!("kubectl returned invalid JSON: {e}")))
    }
}

impl ClusterQuery for KubectlQuery {
    fn get(&self, kind: ResourceKind, name: &str) -> FetchResult<Option<Value>> {
        self.run(&self.get_args(kind, name), Some((kind, name)))
    }

    fn list(&self, kind: ResourceKind, selector: &str) -> FetchResult<Vec<Value>> {
        let Some(doc) = self.run(&self.list_args(kind, selector), None)? else {
            return Ok(Vec::new());
        };
        list_items(doc)
    }
}

/// Whether stderr reports `name` of `kind` missing, as in
/// `Error from server (NotFound): deployments.apps "web" not found`.
///
/// A NotFound for anything else (a namespace, say) does not count.
fn is_not_found(stderr: &str, kind: ResourceKind, name: &str) -> bool {
    let quoted = format!("\"{name}\" not found");
    stderr.lines().any(|line| {
        let Some(rest) = line.trim().strip_prefix("Error from server (NotFound): ") else {
            return false;
        };
        let Some(resource) = rest.strip_suffix(quoted.as_str()) else {
            return false;
        };
        let resource = resource.trim_end();
        resource == kind.as_str() || resource.starts_with(&format!("{}.", kind.as_str()))
    })
}

fn list_items(doc: Value) -> FetchResult<Vec<Value>> {
    match doc {
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(FetchError::Transport(format!(
                "kubectl list returned non-array items: {other}"
            ))),
        },
        other => Err(FetchError::Transport(format!(
            "kubectl list returned a non-object document: {other}"
        ))),
    }
}
