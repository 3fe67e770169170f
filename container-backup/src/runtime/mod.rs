//! Container runtime abstraction.
//!
//! Snapshot and restore only need a handful of runtime calls. They go
//! through [`ContainerRuntime`] so the pipelines can be driven by the Docker
//! Engine API in production and by an in-memory runtime in tests.

pub mod docker;

use async_trait::async_trait;
use serde_json::Value;

use crate::manifest::MountPoint;
use crate::utils::Result;

pub use docker::DockerRuntime;

/// The parts of a container inspection the snapshot needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerDetails {
    pub id: String,
    /// Name as reported by the runtime, usually with a leading `/`
    pub name: String,
    pub config: Value,
    pub port_bindings: Value,
    pub mounts: Vec<MountPoint>,
}

/// One entry of the local image index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImageSummary {
    pub id: String,
    pub repo_tags: Vec<String>,
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails>;

    /// IDs of running containers, or of all containers with `include_stopped`.
    async fn list_containers(&self, include_stopped: bool) -> Result<Vec<String>>;

    async fn list_images(&self) -> Result<Vec<ImageSummary>>;

    async fn image_exists(&self, reference: &str) -> Result<bool>;

    async fn pull_image(&self, reference: &str) -> Result<()>;

    /// Create a container from an opaque configuration and port-binding map.
    /// Returns the new container's ID.
    async fn create_container(
        &self,
        name: Option<&str>,
        config: &Value,
        port_bindings: &Value,
    ) -> Result<String>;

    async fn start_container(&self, id: &str) -> Result<()>;
}

/// Whether an image reference names a tag or digest.
pub fn has_tag(reference: &str) -> bool {
    if reference.contains('@') {
        return true;
    }
    if reference.starts_with("sha256:") {
        return false;
    }
    // A ':' before the last '/' belongs to a registry port.
    let last_segment = reference.rsplit('/').next().unwrap_or(reference);
    last_segment.contains(':')
}

/// Repository part of a `repo:tag` string.
pub fn repository_of(tagged: &str) -> &str {
    let segment_start = tagged.rfind('/').map(|i| i + 1).unwrap_or(0);
    match tagged[segment_start..].rfind(':') {
        Some(i) => &tagged[..segment_start + i],
        None => tagged,
    }
}

/// Short form of a container ID for log output.
pub fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}
