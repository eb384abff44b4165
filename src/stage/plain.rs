//! Stages that do not touch source repositories

use crate::orchestration::ImageSpec;
use crate::signature::hashsum;

/// The `from` stage: the base image, retagged
#[derive(Debug, Clone)]
pub struct BaseStage {
    image: String,
}

impl BaseStage {
    pub const NAME: &'static str = "from";

    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }

    pub fn image_ref(&self) -> &str {
        &self.image
    }

    pub fn signature(&self) -> String {
        hashsum([&self.image])
    }

    pub fn image(&self) -> ImageSpec {
        ImageSpec::new(&self.image)
    }
}

/// A user stage running fixed shell commands
#[derive(Debug, Clone)]
pub struct InstructionStage {
    name: String,
    commands: Vec<String>,
}

impl InstructionStage {
    pub fn new(name: impl Into<String>, commands: Vec<String>) -> Self {
        Self {
            name: name.into(),
            commands,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn signature(&self, prev_signature: &str) -> String {
        let mut parts = vec![prev_signature, self.name.as_str()];
        parts.extend(self.commands.iter().map(String::as_str));
        hashsum(parts)
    }

    pub fn image(&self, from: &str) -> ImageSpec {
        let mut spec = ImageSpec::new(from);
        spec.add_commands(self.commands.iter().cloned());
        spec
    }
}
