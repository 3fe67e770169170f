//! Docker Engine implementation of [`ContainerRuntime`] on top of bollard.

use async_trait::async_trait;
use bollard::container::{
    Config as CreateConfig, CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
    StartContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::{CreateImageOptions, ListImagesOptions};
use bollard::models::{CreateImageInfo, HostConfig, PortBinding};
use bollard::Docker;
use futures_util::TryStreamExt;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use super::{has_tag, ContainerDetails, ContainerRuntime, ImageSummary};
use crate::utils::Result;

/// Seconds before a Docker API request is abandoned.
const REQUEST_TIMEOUT_SECS: u64 = 120;

pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the given socket, or to the local defaults (`DOCKER_HOST`,
    /// then `/var/run/docker.sock`).
    pub fn connect(socket: Option<&Path>) -> Result<Self> {
        let docker = match socket {
            Some(path) => Docker::connect_with_socket(
                &path.to_string_lossy(),
                REQUEST_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            )?,
            None => Docker::connect_with_local_defaults()?,
        };
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails> {
        let info = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await?;

        let config = info
            .config
            .map(serde_json::to_value)
            .transpose()?
            .unwrap_or(Value::Null);
        let port_bindings = info
            .host_config
            .and_then(|host| host.port_bindings)
            .map(serde_json::to_value)
            .transpose()?
            .unwrap_or(Value::Null);
        let mounts = match info.mounts {
            Some(mounts) => serde_json::from_value(serde_json::to_value(mounts)?)?,
            None => Vec::new(),
        };

        Ok(ContainerDetails {
            id: info.id.unwrap_or_else(|| id.to_string()),
            name: info.name.unwrap_or_default(),
            config,
            port_bindings,
            mounts,
        })
    }

    async fn list_containers(&self, include_stopped: bool) -> Result<Vec<String>> {
        let options = ListContainersOptions::<String> {
            all: include_stopped,
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(options)).await?;
        Ok(containers.into_iter().filter_map(|c| c.id).collect())
    }

    async fn list_images(&self) -> Result<Vec<ImageSummary>> {
        let options = ListImagesOptions::<String> {
            all: false,
            ..Default::default()
        };
        let images = self.docker.list_images(Some(options)).await?;
        Ok(images
            .into_iter()
            .map(|image| ImageSummary {
                id: image.id,
                repo_tags: image.repo_tags,
            })
            .collect())
    }

    async fn image_exists(&self, reference: &str) -> Result<bool> {
        match self.docker.inspect_image(reference).await {
            Ok(_) => Ok(true),
            Err(DockerError::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn pull_image(&self, reference: &str) -> Result<()> {
        // Without a tag the engine would pull every tag of the repository.
        let tag = if has_tag(reference) { "" } else { "latest" };
        let options = CreateImageOptions {
            from_image: reference.to_string(),
            tag: tag.to_string(),
            ..Default::default()
        };

        let progress: Vec<CreateImageInfo> = self
            .docker
            .create_image(Some(options), None, None)
            .try_collect()
            .await?;

        if let Some(status) = progress.last().and_then(|p| p.status.as_deref()) {
            debug!(image = reference, "{}", status);
        }
        info!("Pulled image {}", reference);
        Ok(())
    }

    async fn create_container(
        &self,
        name: Option<&str>,
        config: &Value,
        port_bindings: &Value,
    ) -> Result<String> {
        let mut create: CreateConfig<String> = serde_json::from_value(config.clone())?;
        let port_bindings: Option<HashMap<String, Option<Vec<PortBinding>>>> =
            serde_json::from_value(port_bindings.clone())?;
        create.host_config = Some(HostConfig {
            port_bindings,
            ..Default::default()
        });

        let options = name
            .filter(|n| !n.is_empty())
            .map(|n| CreateContainerOptions {
                name: n.to_string(),
                platform: None,
            });

        let response = self.docker.create_container(options, create).await?;
        for warning in &response.warnings {
            tracing::warn!("{}", warning);
        }
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }
}
