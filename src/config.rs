//! Host configuration.
//!
//! Everything the host needs to know about the page it lives in: which element is the
//! drawing surface, which controls map to which engine commands, where textures are
//! served from and how chatty the logger should be.

use crate::command::Command;

/// A UI control bound to an engine command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlBinding {
    pub element_id: String,
    pub command: Command,
}

impl ControlBinding {
    pub fn new(element_id: impl Into<String>, command: impl Into<Command>) -> Self {
        Self {
            element_id: element_id.into(),
            command: command.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Id of the canvas element the engine draws into.
    pub surface_id: String,
    pub controls: Vec<ControlBinding>,
    /// DOM event that counts as an activation of a control.
    pub activation_event: String,
    /// Directory (native) or origin-relative path (wasm) textures are resolved against.
    pub asset_root: String,
    pub log_level: log::LevelFilter,
    /// Texel shown by a texture until its image has been uploaded.
    pub placeholder_rgba: [u8; 4],
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            surface_id: "canvas".to_string(),
            controls: vec![
                ControlBinding::new("left-button", Command::RotateCameraLeft),
                ControlBinding::new("right-button", Command::RotateCameraRight),
            ],
            activation_event: "click".to_string(),
            asset_root: "assets".to_string(),
            log_level: log::LevelFilter::Info,
            placeholder_rgba: [0, 0, 255, 255],
        }
    }
}

impl HostConfig {
    pub fn with_surface_id(mut self, id: impl Into<String>) -> Self {
        self.surface_id = id.into();
        self
    }

    /// Adds a binding. A control that is already bound gets its command replaced.
    pub fn with_control(mut self, element_id: impl Into<String>, command: impl Into<Command>) -> Self {
        let binding = ControlBinding::new(element_id, command);
        match self
            .controls
            .iter_mut()
            .find(|existing| existing.element_id == binding.element_id)
        {
            Some(existing) => existing.command = binding.command,
            None => self.controls.push(binding),
        }
        self
    }

    pub fn without_controls(mut self) -> Self {
        self.controls.clear();
        self
    }

    pub fn with_asset_root(mut self, root: impl Into<String>) -> Self {
        self.asset_root = root.into();
        self
    }

    pub fn with_log_level(mut self, level: log::LevelFilter) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_placeholder(mut self, rgba: [u8; 4]) -> Self {
        self.placeholder_rgba = rgba;
        self
    }
}
