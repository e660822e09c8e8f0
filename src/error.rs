//! Error taxonomy of the host layer.
//!
//! Each subsystem fails in its own way and the page reacts differently to each:
//!
//! - [`LoadError`] is fatal to the page session. Rendering and input wiring never start.
//! - [`CommandError`] is recovered where it happens. The page keeps running.
//! - [`RenderError`] halts the frame scheduler. Input and textures keep running.
//! - [`DecodeError`] leaves one texture permanently failed.
//!
//! Engines report their own failures as [`anyhow::Error`]; the host wraps them here.

use thiserror::Error;

use crate::command::Command;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("the engine was already loaded for this page")]
    AlreadyLoaded,

    #[error("no surface element with id `{0}` exists in the page")]
    SurfaceMissing(String),

    #[error("element `{id}` cannot be used as a drawing surface: {reason}")]
    IncompatibleSurface { id: String, reason: String },

    #[error("GPU context could not be created: {0:#}")]
    Gpu(anyhow::Error),

    #[error("engine construction failed: {0:#}")]
    Construction(anyhow::Error),
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command `{0}` was issued after the engine was torn down")]
    TornDown(Command),

    #[error("command `{0}` was issued while the engine was busy")]
    Busy(Command),

    #[error("engine rejected command `{command}`: {error:#}")]
    Engine {
        command: Command,
        error: anyhow::Error,
    },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render was called after the engine was torn down")]
    TornDown,

    #[error("render was called while the engine was already in use")]
    Reentrant,

    #[error("the next frame could not be requested: {0:#}")]
    Schedule(anyhow::Error),

    #[error("engine failed to render frame {frame}: {error:#}")]
    Engine { frame: u64, error: anyhow::Error },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("texture `{url}` could not be fetched: {error:#}")]
    Fetch { url: String, error: anyhow::Error },

    #[error("texture `{url}` could not be decoded: {source}")]
    Decode {
        url: String,
        #[source]
        source: image::ImageError,
    },

    #[error("texture `{url}` could not be uploaded: {error:#}")]
    Upload { url: String, error: anyhow::Error },
}
