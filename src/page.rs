//! The page lifecycle.
//!
//! A [`Page`] ties the components together with an explicit lifecycle:
//!
//! 1. `Idle`: created with its surface, texture pipeline and engine constructor.
//! 2. `Loading`: the engine is being constructed ([`Page::begin`]).
//! 3. `Running`: the engine exists, the render loop is scheduled and input is wired
//!    ([`Page::finish`]). Or `Failed`, in which case neither ever starts.
//! 4. `TornDown`: [`Page::teardown`] stopped the loop and dropped the engine.
//!
//! Loading is split into `begin` and `finish` so that nothing borrows the page while
//! the constructor is suspended; the browser glue keeps the page in a global cell and
//! input or frame callbacks may need it in the meantime. [`Page::init`] runs both
//! halves back to back.

use crate::{
    config::HostConfig,
    engine::{EngineConstructor, EngineInit},
    error::{LoadError, RenderError},
    gpu::GpuContext,
    input::{Dispatch, InputBridge},
    loader::ModuleLoader,
    scheduler::{FrameScheduler, FrameSource, FrameTick},
    session::EngineSession,
    surface::Surface,
    texture::TexturePipeline,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageState {
    Idle,
    Loading,
    Running,
    Failed,
    TornDown,
}

/// An engine load that runs without borrowing its page.
pub struct PendingLoad<G: GpuContext> {
    loader: ModuleLoader<G>,
    init: EngineInit<G>,
}

impl<G: GpuContext> PendingLoad<G> {
    pub async fn run(mut self) -> Result<EngineSession, LoadError> {
        self.loader.load(self.init).await
    }
}

pub struct Page<G: GpuContext> {
    config: HostConfig,
    state: PageState,
    surface: Surface,
    textures: TexturePipeline<G>,
    loader: Option<ModuleLoader<G>>,
    session: Option<EngineSession>,
    scheduler: Option<FrameScheduler>,
    input: Option<InputBridge>,
}

impl<G: GpuContext> std::fmt::Debug for Page<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("state", &self.state)
            .field("surface", &self.surface.id())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl<G: GpuContext> Page<G> {
    pub fn new(
        config: HostConfig,
        surface: Surface,
        textures: TexturePipeline<G>,
        constructor: EngineConstructor<G>,
    ) -> Self {
        Self {
            config,
            state: PageState::Idle,
            surface,
            textures,
            loader: Some(ModuleLoader::new(constructor)),
            session: None,
            scheduler: None,
            input: None,
        }
    }

    /// Loads the engine and, if that worked, starts the render loop and input.
    pub async fn init(&mut self, frames: Box<dyn FrameSource>) -> Result<(), LoadError> {
        let pending = self.begin()?;
        let result = pending.run().await;
        self.finish(result, frames)
    }

    /// Moves the page to `Loading` and hands out the engine load.
    pub fn begin(&mut self) -> Result<PendingLoad<G>, LoadError> {
        let loader = match (self.state, self.loader.take()) {
            (PageState::Idle, Some(loader)) => loader,
            (_, loader) => {
                self.loader = loader;
                return Err(LoadError::AlreadyLoaded);
            }
        };
        self.state = PageState::Loading;
        Ok(PendingLoad {
            loader,
            init: EngineInit {
                surface: self.surface.clone(),
                gpu: self.textures.gpu().clone(),
                textures: self.textures.clone(),
            },
        })
    }

    /// Takes the outcome of the engine load.
    ///
    /// On success the render loop is scheduled exactly once and the controls are bound.
    /// On failure the error is logged and returned; no frame is ever requested and no
    /// command ever issued.
    ///
    /// Only a page that is `Loading` (or was torn down while loading) takes a result.
    /// Anything else fails with [`LoadError::AlreadyLoaded`] and an incoming engine is
    /// torn down unused.
    pub fn finish(
        &mut self,
        result: Result<EngineSession, LoadError>,
        frames: Box<dyn FrameSource>,
    ) -> Result<(), LoadError> {
        if !matches!(self.state, PageState::Loading | PageState::TornDown) {
            if let Ok(session) = &result {
                session.teardown();
            }
            log::error!("load result delivered to a page that is {:?}; dropped", self.state);
            return Err(LoadError::AlreadyLoaded);
        }

        let session = match result {
            Ok(session) => session,
            Err(e) => {
                if self.state != PageState::TornDown {
                    self.state = PageState::Failed;
                }
                log::error!("page could not start: {}", e);
                return Err(e);
            }
        };

        if self.state == PageState::TornDown {
            log::warn!("engine finished loading after the page was torn down; dropping it");
            session.teardown();
            return Ok(());
        }

        let mut scheduler = FrameScheduler::new(session.clone(), frames);
        // Input still works without a loop.
        if let Err(e) = scheduler.start() {
            log::error!("page is running without a render loop: {}", e);
        }
        self.input = Some(InputBridge::new(session.clone(), self.config.controls.clone()));
        self.scheduler = Some(scheduler);
        self.session = Some(session);
        self.state = PageState::Running;
        Ok(())
    }

    /// Routes a refresh signal to the render loop.
    pub fn on_refresh(&mut self, tick: FrameTick) -> Result<(), RenderError> {
        match &mut self.scheduler {
            Some(scheduler) => scheduler.on_refresh(tick),
            None => Ok(()),
        }
    }

    /// Routes an activation of `control` to the input bridge.
    pub fn activate(&self, control: &str) -> Dispatch {
        match &self.input {
            Some(input) => input.activate(control),
            None => {
                log::warn!(
                    "activation of `{}` ignored while the page is {:?}",
                    control,
                    self.state
                );
                Dispatch::Unbound
            }
        }
    }

    /// Stops the render loop and drops the engine. Idempotent.
    ///
    /// Controls stay bound, so late activations fail and get logged instead of
    /// reaching a dead engine. Textures still waiting for their image are reported.
    pub fn teardown(&mut self) {
        if self.state == PageState::TornDown {
            return;
        }
        if let Some(scheduler) = &mut self.scheduler {
            scheduler.stop();
        }
        if let Some(session) = &self.session {
            session.teardown();
        }
        if let Some(mut loader) = self.loader.take() {
            loader.abandon();
        }
        for url in self.textures.pending() {
            log::warn!("texture `{}` never finished loading", url);
        }
        self.state = PageState::TornDown;
        log::info!("page torn down");
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn textures(&self) -> &TexturePipeline<G> {
        &self.textures
    }

    pub fn session(&self) -> Option<&EngineSession> {
        self.session.as_ref()
    }

    pub fn scheduler(&self) -> Option<&FrameScheduler> {
        self.scheduler.as_ref()
    }
}
