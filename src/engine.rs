//! The engine capability consumed by the host.
//!
//! The host makes no assumptions about how an engine draws or what its scene looks
//! like. It needs exactly two things: a way to draw one frame and a way to deliver a
//! named [`Command`]. Anything that implements [`Engine`] can be driven by the page.
//!
//! Engines are built asynchronously by an [`EngineConstructor`], which receives the
//! [`EngineInit`] bundle: the surface to draw into, the shared GPU context and the
//! texture pipeline it may request images from.

use std::{fmt::Debug, rc::Rc};

use futures::future::LocalBoxFuture;

use crate::{command::Command, gpu::GpuContext, surface::Surface, texture::TexturePipeline};

pub trait Engine {
    /// Draw one frame.
    ///
    /// Called once per display refresh. An error stops the render loop for good.
    fn render(&mut self) -> anyhow::Result<()>;

    /// Apply a one-shot command such as a camera rotation.
    ///
    /// The effect becomes visible on the next [`render`](Self::render). Engines should
    /// return an error for commands they do not understand.
    fn command(&mut self, command: &Command) -> anyhow::Result<()>;
}

impl Debug for dyn Engine + 'static {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Engine")
    }
}

/// Everything an engine is handed at construction time.
pub struct EngineInit<G: GpuContext> {
    pub surface: Surface,
    pub gpu: Rc<G>,
    pub textures: TexturePipeline<G>,
}

impl<G: GpuContext> Clone for EngineInit<G> {
    fn clone(&self) -> Self {
        Self {
            surface: self.surface.clone(),
            gpu: Rc::clone(&self.gpu),
            textures: self.textures.clone(),
        }
    }
}

/// Asynchronous engine factory.
///
/// Construction may suspend, e.g. while the engine negotiates GPU capabilities or
/// fetches its meshes.
pub type EngineConstructor<G> =
    Box<dyn FnOnce(EngineInit<G>) -> LocalBoxFuture<'static, anyhow::Result<Box<dyn Engine>>>>;
