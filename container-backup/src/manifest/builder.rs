//! Builds a [`Manifest`] from a live container.

use serde_json::Value;
use tracing::{debug, info};

use super::Manifest;
use crate::runtime::{has_tag, repository_of, short_id, ContainerRuntime, ImageSummary};
use crate::utils::naming::container_short_name;
use crate::utils::Result;

/// Placeholder tag the engine reports for dangling images.
const UNTAGGED: &str = "<none>:<none>";

/// A manifest together with the container it was taken from.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub container_id: String,
    pub manifest: Manifest,
}

/// Inspect `id` and capture its configuration, port bindings and mounts.
///
/// With `resolve_tags`, an untagged image reference is replaced by the most
/// specific tag found in the local image index.
pub async fn build_manifest<R>(runtime: &R, id: &str, resolve_tags: bool) -> Result<Snapshot>
where
    R: ContainerRuntime + ?Sized,
{
    let details = runtime.inspect_container(id).await?;
    let mut config = details.config;

    if resolve_tags {
        let image = config
            .get("Image")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if !image.is_empty() && !has_tag(&image) {
            let images = runtime.list_images().await?;
            let resolved = resolve_image_tag(&image, &images);
            if resolved != image {
                debug!("Resolved image {} to {}", image, resolved);
                config["Image"] = Value::String(resolved);
            }
        }
    }

    let manifest = Manifest {
        name: details.name,
        config,
        port_map: details.port_bindings,
        mounts: details.mounts,
    };

    info!(
        "Creating backup of {} ({}, {})",
        container_short_name(&manifest.name),
        manifest.image(),
        short_id(&details.id)
    );

    Ok(Snapshot {
        container_id: details.id,
        manifest,
    })
}

/// Find the most specific tag for an untagged image reference.
///
/// Looks for an image whose ID or repository matches `reference`. Among its
/// tags an exact repository match wins, then one containing `reference`,
/// then the first tag. Falls back to `reference` itself when nothing matches.
pub fn resolve_image_tag(reference: &str, images: &[ImageSummary]) -> String {
    if has_tag(reference) {
        return reference.to_string();
    }

    let wanted_id = reference.trim_start_matches("sha256:");

    for image in images {
        let tags: Vec<&String> = image
            .repo_tags
            .iter()
            .filter(|t| t.as_str() != UNTAGGED)
            .collect();
        if tags.is_empty() {
            continue;
        }

        let id_matches =
            !wanted_id.is_empty() && image.id.trim_start_matches("sha256:").starts_with(wanted_id);
        let repo_matches = tags.iter().any(|t| repository_of(t) == reference);
        if !id_matches && !repo_matches {
            continue;
        }

        let preferred = tags
            .iter()
            .find(|t| repository_of(t) == reference)
            .or_else(|| tags.iter().find(|t| t.contains(reference)))
            .unwrap_or(&tags[0]);
        return (*preferred).clone();
    }

    reference.to_string()
}
