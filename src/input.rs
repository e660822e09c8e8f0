//! Relaying UI activations to the engine.
//!
//! Every activation of a bound control turns into exactly one engine command,
//! delivered synchronously and in event order. There is no debouncing and no queue:
//! two quick clicks before the next frame produce two commands, both applied before
//! that frame renders.
//!
//! The bridge does not check the engine's state up front. If the engine is gone the
//! command fails, the failure is logged and the page carries on.

use crate::{
    command::Command, config::ControlBinding, error::CommandError, session::EngineSession,
};

/// What happened to one activation.
#[derive(Debug)]
pub enum Dispatch {
    /// The engine accepted the command.
    Delivered(Command),
    /// The command was issued but failed; already logged.
    Failed(CommandError),
    /// The control has no binding.
    Unbound,
}

impl Dispatch {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Dispatch::Delivered(_))
    }
}

#[derive(Debug, Clone)]
pub struct InputBridge {
    bindings: Vec<ControlBinding>,
    session: EngineSession,
}

impl InputBridge {
    pub fn new(session: EngineSession, bindings: Vec<ControlBinding>) -> Self {
        Self { bindings, session }
    }

    pub fn bindings(&self) -> &[ControlBinding] {
        &self.bindings
    }

    /// Handles one activation of `control`.
    pub fn activate(&self, control: &str) -> Dispatch {
        let Some(binding) = self
            .bindings
            .iter()
            .find(|binding| binding.element_id == control)
        else {
            log::debug!("activation of unbound control `{}` ignored", control);
            return Dispatch::Unbound;
        };

        match self.session.command(&binding.command) {
            Ok(()) => {
                log::trace!("`{}` -> {}", control, binding.command);
                Dispatch::Delivered(binding.command.clone())
            }
            Err(e) => {
                log::error!("control `{}`: {}", control, e);
                Dispatch::Failed(e)
            }
        }
    }
}
