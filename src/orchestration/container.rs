//! Container specs shared by runtime implementations
//!
//! Contains the data handed to a runtime. The actual execution logic lives
//! in the runtime implementations.

/// Description of one image layer to build on top of `from`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSpec {
    /// Image the build container starts from
    pub from: String,
    /// Volume mounts (host:container format)
    volumes: Vec<String>,
    /// Containers whose volumes are attached to the build container
    volumes_from: Vec<String>,
    /// Shell commands, run in order by one shell
    commands: Vec<String>,
}

impl ImageSpec {
    /// Start an empty spec on top of `from`
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            volumes: vec![],
            volumes_from: vec![],
            commands: vec![],
        }
    }

    pub fn add_volume(&mut self, volume: impl Into<String>) {
        self.volumes.push(volume.into());
    }

    pub fn add_volumes_from(&mut self, container: impl Into<String>) {
        self.volumes_from.push(container.into());
    }

    pub fn add_commands<I, S>(&mut self, commands: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.extend(commands.into_iter().map(Into::into));
    }

    /// Put commands in front of everything added so far
    pub fn unshift_commands<I, S>(&mut self, commands: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut head: Vec<String> = commands.into_iter().map(Into::into).collect();
        head.append(&mut self.commands);
        self.commands = head;
    }

    pub fn volumes(&self) -> &[String] {
        &self.volumes
    }

    pub fn volumes_from(&self) -> &[String] {
        &self.volumes_from
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Whether building this spec would change nothing but the tag
    pub fn is_passthrough(&self) -> bool {
        self.commands.is_empty()
    }

    /// The script handed to `/bin/sh -ec`
    pub fn script(&self) -> String {
        self.commands.join("\n")
    }
}

/// Request to create the long-lived sidecar container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarCreate {
    /// Container name
    pub name: String,
    /// Tool image reference
    pub image: String,
    /// Volume path inside the sidecar holding the tool binaries
    pub volume: String,
}
