//! canvas-host
//!
//! The browser host layer of a WebGPU application. It loads a rendering engine onto a
//! `<canvas>`, drives the engine's frame loop from the display refresh, relays UI
//! control activations as engine commands and streams textures from image URLs onto
//! the GPU without blocking rendering.
//!
//! The engine itself is opaque: anything implementing [`Engine`] can be hosted.
//!
//! High-level modules
//! - `loader`: one-shot asynchronous engine construction
//! - `scheduler`: the render loop as an explicit state machine
//! - `input`: control activations to engine commands
//! - `texture`: pending texture handles, async decode and a single upload each
//! - `page`: the page lifecycle tying the above together
//! - `web`: browser glue (`requestAnimationFrame`, DOM listeners), wasm only
//!
//! Everything is single threaded. Shared state uses `Rc` and `RefCell`; a re-entrant
//! call into the engine is reported as an error instead of panicking.

pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod gpu;
pub mod input;
pub mod loader;
pub mod logging;
pub mod page;
pub mod resources;
pub mod scheduler;
pub mod session;
pub mod surface;
pub mod texture;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use command::Command;
pub use config::{ControlBinding, HostConfig};
pub use engine::{Engine, EngineConstructor, EngineInit};
pub use error::{CommandError, DecodeError, LoadError, RenderError};
pub use gpu::{GpuContext, GpuTexture, WgpuContext};
pub use input::{Dispatch, InputBridge};
pub use loader::{LoaderState, ModuleLoader};
pub use page::{Page, PageState, PendingLoad};
pub use scheduler::{FrameRequest, FrameScheduler, FrameSource, FrameTick, ManualFrames, SchedulerState};
pub use session::EngineSession;
pub use surface::Surface;
pub use texture::{DecodeState, TexturePipeline, TextureResource};
