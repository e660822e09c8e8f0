//! Browser glue.
//!
//! The page lives in a thread-local cell for the lifetime of the document. Callbacks
//! from the browser (animation frames, control clicks, `pagehide`) look it up there;
//! since the browser never runs two callbacks at once, the cell is never contended.
//!
//! Call [`launch`] once from the wasm start function. Teardown happens on `pagehide`
//! or when JavaScript calls the exported `shutdown`.

use std::{cell::RefCell, rc::Rc};

use futures::task::{LocalFutureObj, LocalSpawn, SpawnError};
use wasm_bindgen::{JsCast, closure::Closure, prelude::*};

use crate::{
    config::HostConfig,
    engine::EngineConstructor,
    error::LoadError,
    gpu::WgpuContext,
    logging::init_logging,
    page::{Page, PageState},
    resources::AssetSource,
    scheduler::{FrameRequest, FrameSource, FrameTick},
    surface::Surface,
    texture::TexturePipeline,
};

thread_local! {
    static PAGE: RefCell<Option<Page<WgpuContext>>> = const { RefCell::new(None) };
    static LISTENERS: RefCell<Vec<DomListener>> = const { RefCell::new(Vec::new()) };
}

fn with_page<R>(f: impl FnOnce(&mut Page<WgpuContext>) -> R) -> Option<R> {
    PAGE.with(|slot| match slot.try_borrow_mut() {
        Ok(mut page) => page.as_mut().map(f),
        Err(_) => {
            log::error!("page is busy; browser callback dropped");
            None
        }
    })
}

/// Runs load tasks on the browser's microtask queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct MicrotaskSpawner;

impl LocalSpawn for MicrotaskSpawner {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        wasm_bindgen_futures::spawn_local(future);
        Ok(())
    }
}

/// Refresh signals from `requestAnimationFrame`, routed to the global page.
pub struct RafFrameSource {
    window: Option<web_sys::Window>,
    callback: Closure<dyn FnMut(f64)>,
}

impl RafFrameSource {
    pub fn new() -> Self {
        let callback = Closure::wrap(Box::new(|timestamp_ms: f64| {
            match with_page(|page| page.on_refresh(FrameTick::at(timestamp_ms))) {
                Some(Ok(())) => {}
                // Logged by the scheduler when it halted.
                Some(Err(e)) => log::debug!("no further frames after {:.1}ms: {}", timestamp_ms, e),
                None => log::warn!("refresh at {:.1}ms was dropped", timestamp_ms),
            }
        }) as Box<dyn FnMut(f64)>);
        Self {
            window: web_sys::window(),
            callback,
        }
    }
}

impl Default for RafFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for RafFrameSource {
    fn request_frame(&mut self) -> anyhow::Result<FrameRequest> {
        let window = self
            .window
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no global window"))?;
        window
            .request_animation_frame(self.callback.as_ref().unchecked_ref())
            .map(FrameRequest)
            .map_err(|e| anyhow::anyhow!("requestAnimationFrame failed: {:?}", e))
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if let Some(window) = &self.window {
            if let Err(e) = window.cancel_animation_frame(request.0) {
                log::warn!("cancelAnimationFrame failed: {:?}", e);
            }
        }
    }
}

/// A registered DOM listener; dropping it unregisters the callback.
struct DomListener {
    target: web_sys::EventTarget,
    event: String,
    closure: Closure<dyn FnMut(web_sys::Event)>,
}

impl Drop for DomListener {
    fn drop(&mut self) {
        if let Err(e) = self
            .target
            .remove_event_listener_with_callback(&self.event, self.closure.as_ref().unchecked_ref())
        {
            log::warn!("could not remove `{}` listener: {:?}", self.event, e);
        }
    }
}

/// Starts the page: looks up the canvas, sets up the GPU, constructs the engine and,
/// if all of that worked, starts the render loop and binds the controls.
///
/// Failures are logged; the page then stays inert.
pub fn launch(config: HostConfig, constructor: EngineConstructor<WgpuContext>) {
    init_logging(config.log_level);
    wasm_bindgen_futures::spawn_local(async move {
        if let Err(e) = boot(config, constructor).await {
            log::error!("page could not start: {}", e);
        }
    });
}

async fn boot(
    config: HostConfig,
    constructor: EngineConstructor<WgpuContext>,
) -> Result<(), LoadError> {
    if PAGE.with(|slot| slot.borrow().is_some()) {
        return Err(LoadError::AlreadyLoaded);
    }

    let surface = Surface::from_element_id(&config.surface_id)?;
    let gpu = Rc::new(WgpuContext::new(&surface).await.map_err(LoadError::Gpu)?);
    let textures = TexturePipeline::new(
        gpu,
        AssetSource::new(config.asset_root.clone()),
        MicrotaskSpawner,
    )
    .with_placeholder(config.placeholder_rgba);

    let page = Page::new(config.clone(), surface, textures, constructor);
    let pending = PAGE.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            return Err(LoadError::AlreadyLoaded);
        }
        slot.insert(page).begin()
    })?;

    let result = pending.run().await;
    // `finish` logs its own failure. A page torn down while loading finishes fine
    // but must not get its controls back.
    let started = with_page(|page| {
        let _ = page.finish(result, Box::new(RafFrameSource::new()));
        page.state() == PageState::Running
    })
    .unwrap_or(false);

    if started {
        bind_controls(&config);
        watch_pagehide();
    }
    Ok(())
}

fn bind_controls(config: &HostConfig) {
    let Some(document) = web_sys::window().and_then(|window| window.document()) else {
        log::warn!("no document; controls stay unbound");
        return;
    };

    let mut listeners = Vec::new();
    for binding in &config.controls {
        let Some(element) = document.get_element_by_id(&binding.element_id) else {
            log::warn!(
                "control `{}` for `{}` is not in the page",
                binding.element_id,
                binding.command
            );
            continue;
        };
        let control = binding.element_id.clone();
        let closure = Closure::wrap(Box::new(move |_: web_sys::Event| {
            with_page(|page| page.activate(&control));
        }) as Box<dyn FnMut(web_sys::Event)>);

        let target: web_sys::EventTarget = element.into();
        match target.add_event_listener_with_callback(
            &config.activation_event,
            closure.as_ref().unchecked_ref(),
        ) {
            Ok(()) => listeners.push(DomListener {
                target,
                event: config.activation_event.clone(),
                closure,
            }),
            Err(e) => log::warn!("could not bind `{}`: {:?}", binding.element_id, e),
        }
    }
    log::info!("{} controls bound", listeners.len());
    LISTENERS.with(|slot| slot.borrow_mut().extend(listeners));
}

fn watch_pagehide() {
    let Some(window) = web_sys::window() else {
        return;
    };
    let closure = Closure::wrap(Box::new(|_: web_sys::Event| shutdown()) as Box<dyn FnMut(web_sys::Event)>);
    if let Err(e) = window.add_event_listener_with_callback("pagehide", closure.as_ref().unchecked_ref()) {
        log::warn!("teardown on pagehide is unavailable: {:?}", e);
    }
    // Lives as long as the document.
    closure.forget();
}

/// Tears the page down: stops the render loop, drops the engine and unbinds the
/// controls.
#[wasm_bindgen]
pub fn shutdown() {
    with_page(|page| page.teardown());
    LISTENERS.with(|slot| slot.borrow_mut().clear());
}
