//! In-memory runtime for tests

use crate::error::{StrataError, StrataResult};
use crate::orchestration::container::{ImageSpec, SidecarCreate};
use crate::orchestration::runtime::ContainerRuntime;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub(crate) struct FakeState {
    pub containers: HashSet<String>,
    pub images: HashSet<String>,
    pub builds: Vec<(ImageSpec, String)>,
    pub tags: Vec<(String, String)>,
    pub create_calls: usize,
    pub inspect_calls: usize,
}

/// Records every call. Optional knobs simulate failures and races.
#[derive(Debug, Default)]
pub(crate) struct FakeRuntime {
    pub state: Mutex<FakeState>,
    /// Every build_image call fails
    pub fail_builds: bool,
    /// create_sidecar fails outright and creates nothing
    pub fail_create: bool,
    /// Another process creates the sidecar between our inspect and create
    pub lose_create_race: bool,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inspect_calls(&self) -> usize {
        self.state.lock().unwrap().inspect_calls
    }

    pub fn builds(&self) -> Vec<(ImageSpec, String)> {
        self.state.lock().unwrap().builds.clone()
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls
    }

    pub fn containers(&self) -> HashSet<String> {
        self.state.lock().unwrap().containers.clone()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn is_available(&self) -> StrataResult<bool> {
        Ok(true)
    }

    async fn ensure_ready(&self) -> StrataResult<()> {
        Ok(())
    }

    async fn container_exists(&self, name: &str) -> StrataResult<bool> {
        let mut state = self.state.lock().unwrap();
        state.inspect_calls += 1;
        Ok(state.containers.contains(name))
    }

    async fn create_sidecar(&self, request: &SidecarCreate) -> StrataResult<()> {
        let mut state = self.state.lock().unwrap();
        state.create_calls += 1;

        if self.lose_create_race {
            state.containers.insert(request.name.clone());
            return Err(StrataError::SidecarProvision {
                name: request.name.clone(),
                reason: "docker run exited with 125".to_string(),
            });
        }
        if self.fail_create || !state.containers.insert(request.name.clone()) {
            return Err(StrataError::SidecarProvision {
                name: request.name.clone(),
                reason: "docker run exited with 125".to_string(),
            });
        }
        Ok(())
    }

    async fn remove_container(&self, name: &str) -> StrataResult<()> {
        self.state.lock().unwrap().containers.remove(name);
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> StrataResult<bool> {
        Ok(self.state.lock().unwrap().images.contains(image))
    }

    async fn tag_image(&self, source: &str, tag: &str) -> StrataResult<()> {
        let mut state = self.state.lock().unwrap();
        state.tags.push((source.to_string(), tag.to_string()));
        state.images.insert(tag.to_string());
        Ok(())
    }

    async fn build_image(
        &self,
        spec: &ImageSpec,
        tag: &str,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> StrataResult<()> {
        on_output(format!("building {}", tag));
        let mut state = self.state.lock().unwrap();
        state.builds.push((spec.clone(), tag.to_string()));

        if self.fail_builds {
            return Err(StrataError::ImageBuild {
                tag: tag.to_string(),
                output: "exit 1".to_string(),
            });
        }
        state.images.insert(tag.to_string());
        Ok(())
    }

    fn runtime_name(&self) -> &'static str {
        "Fake"
    }
}
