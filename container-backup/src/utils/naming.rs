//! Artifact file name derivation.

/// Characters that become `-` before illegal characters are dropped.
const SEPARATORS: &[char] = &[' ', '&', '_', '=', '+', ':'];

/// Make a string safe to use as a path: lowercase, `..` removed, separators
/// turned into `-`, and anything outside `[a-z0-9~-./]` dropped.
pub fn sanitize_path(s: &str) -> String {
    let lowered = s.to_lowercase().replace("..", "");

    let mut cleaned: String = lowered
        .chars()
        .map(|c| if SEPARATORS.contains(&c) { '-' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '~' | '-' | '.' | '/'))
        .collect();

    while cleaned.contains("--") {
        cleaned = cleaned.replace("--", "-");
    }
    while cleaned.contains("//") {
        cleaned = cleaned.replace("//", "/");
    }

    cleaned
}

/// Base name (without extension) of the artifacts for one container snapshot.
///
/// Derived from `<image>-<container id>` with path separators collapsed to `_`.
pub fn artifact_base_name(image: &str, container_id: &str) -> String {
    sanitize_path(&format!("{}-{}", image, container_id)).replace('/', "_")
}

/// Container name without the runtime's leading `/` or any other path-like prefix.
pub fn container_short_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}
