//! The single constructed engine of a page.

use std::{cell::RefCell, rc::Rc};

use crate::{
    command::Command,
    engine::Engine,
    error::{CommandError, RenderError},
};

/// Shared handle to the page's engine.
///
/// The scheduler and the input bridge each hold a clone; the engine itself lives once
/// behind the handle. After [`teardown`](Self::teardown) the engine is dropped and
/// every further call fails instead of reaching it.
#[derive(Debug, Clone)]
pub struct EngineSession {
    engine: Rc<RefCell<Option<Box<dyn Engine>>>>,
}

impl EngineSession {
    pub(crate) fn new(engine: Box<dyn Engine>) -> Self {
        Self {
            engine: Rc::new(RefCell::new(Some(engine))),
        }
    }

    /// Draws one frame. `frame` is only used for error reporting.
    pub fn render(&self, frame: u64) -> Result<(), RenderError> {
        let mut slot = self
            .engine
            .try_borrow_mut()
            .map_err(|_| RenderError::Reentrant)?;
        let engine = slot.as_mut().ok_or(RenderError::TornDown)?;
        engine
            .render()
            .map_err(|error| RenderError::Engine { frame, error })
    }

    pub fn command(&self, command: &Command) -> Result<(), CommandError> {
        let mut slot = self
            .engine
            .try_borrow_mut()
            .map_err(|_| CommandError::Busy(command.clone()))?;
        let engine = slot
            .as_mut()
            .ok_or_else(|| CommandError::TornDown(command.clone()))?;
        engine.command(command).map_err(|error| CommandError::Engine {
            command: command.clone(),
            error,
        })
    }

    pub fn is_alive(&self) -> bool {
        self.engine
            .try_borrow()
            .map(|slot| slot.is_some())
            .unwrap_or(true)
    }

    /// Drops the engine. Returns `false` if it was already gone.
    pub fn teardown(&self) -> bool {
        match self.engine.try_borrow_mut() {
            Ok(mut slot) => slot.take().is_some(),
            Err(_) => {
                log::error!("engine teardown requested while the engine is in use");
                false
            }
        }
    }
}
