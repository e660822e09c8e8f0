//! One-shot engine construction.

use crate::{
    engine::{EngineConstructor, EngineInit},
    error::LoadError,
    gpu::GpuContext,
    session::EngineSession,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoaderState {
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// Builds the page's engine, at most once.
///
/// There is no cancellation and no retry. On failure nothing of the engine stays
/// reachable and the caller must not start the render loop or wire up input.
pub struct ModuleLoader<G: GpuContext> {
    // Taken by the first `load`.
    constructor: Option<EngineConstructor<G>>,
    state: LoaderState,
}

impl<G: GpuContext> std::fmt::Debug for ModuleLoader<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("state", &self.state)
            .finish()
    }
}

impl<G: GpuContext> ModuleLoader<G> {
    pub fn new(constructor: EngineConstructor<G>) -> Self {
        Self {
            constructor: Some(constructor),
            state: LoaderState::Idle,
        }
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    /// Runs the constructor with `init` and wraps the engine in a session.
    ///
    /// A second call fails with [`LoadError::AlreadyLoaded`] without touching the
    /// first engine.
    pub async fn load(&mut self, init: EngineInit<G>) -> Result<EngineSession, LoadError> {
        let constructor = self.constructor.take().ok_or(LoadError::AlreadyLoaded)?;
        self.state = LoaderState::Loading;
        log::info!("constructing engine on surface `{}`", init.surface.id());

        match constructor(init).await {
            Ok(engine) => {
                self.state = LoaderState::Loaded;
                log::info!("engine ready");
                Ok(EngineSession::new(engine))
            }
            Err(e) => {
                self.state = LoaderState::Failed;
                Err(LoadError::Construction(e))
            }
        }
    }

    /// Marks the load as failed before the constructor could run, e.g. because the
    /// surface or GPU context was unavailable. The constructor is dropped unused.
    pub fn abandon(&mut self) {
        if self.constructor.take().is_some() {
            self.state = LoaderState::Failed;
        }
    }
}
