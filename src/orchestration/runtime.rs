//! Container runtime abstraction
//!
//! Provides a trait for the container operations the builder needs, so
//! that docker and podman (and test doubles) are interchangeable.

use crate::error::StrataResult;
use crate::orchestration::container::{ImageSpec, SidecarCreate};
use async_trait::async_trait;

/// Abstract container runtime interface
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check if the runtime is available on this system
    async fn is_available(&self) -> StrataResult<bool>;

    /// Ensure the runtime is ready to build
    async fn ensure_ready(&self) -> StrataResult<()>;

    /// Whether a container with this name exists (`inspect` exit code)
    async fn container_exists(&self, name: &str) -> StrataResult<bool>;

    /// Create the sidecar container. Fails on any non-zero exit, including
    /// a name collision; callers decide whether that is acceptable.
    async fn create_sidecar(&self, request: &SidecarCreate) -> StrataResult<()>;

    /// Remove a container, ignoring one that does not exist
    async fn remove_container(&self, name: &str) -> StrataResult<()>;

    /// Check if an image exists locally
    async fn image_exists(&self, image: &str) -> StrataResult<bool>;

    /// Tag `source` as `tag`, pulling `source` first if needed
    async fn tag_image(&self, source: &str, tag: &str) -> StrataResult<()>;

    /// Run `spec` in a throwaway container and commit the result as `tag`.
    ///
    /// Returning `Ok` means the image was accepted into the local cache.
    async fn build_image(
        &self,
        spec: &ImageSpec,
        tag: &str,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> StrataResult<()>;

    /// Get the human-readable runtime name for display
    fn runtime_name(&self) -> &'static str;
}
