//! The drawing surface the engine is bound to.
//!
//! The page owns the surface. The engine only gets a clone of the handle, which in the
//! browser is another reference to the same canvas element.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsCast;

#[cfg(target_arch = "wasm32")]
use crate::error::LoadError;

#[derive(Debug, Clone)]
pub struct Surface {
    id: String,
    #[cfg(not(target_arch = "wasm32"))]
    size: (u32, u32),
    #[cfg(target_arch = "wasm32")]
    canvas: web_sys::HtmlCanvasElement,
}

impl Surface {
    /// Looks up the canvas with the given element id.
    ///
    /// Fails with [`LoadError::SurfaceMissing`] if no such element exists and with
    /// [`LoadError::IncompatibleSurface`] if it is not a `<canvas>`.
    #[cfg(target_arch = "wasm32")]
    pub fn from_element_id(id: &str) -> Result<Self, LoadError> {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| LoadError::SurfaceMissing(id.to_string()))?;
        let element = document
            .get_element_by_id(id)
            .ok_or_else(|| LoadError::SurfaceMissing(id.to_string()))?;
        let canvas = element
            .dyn_into::<web_sys::HtmlCanvasElement>()
            .map_err(|element| LoadError::IncompatibleSurface {
                id: id.to_string(),
                reason: format!("expected a <canvas>, found <{}>", element.tag_name().to_lowercase()),
            })?;
        Ok(Self {
            id: id.to_string(),
            canvas,
        })
    }

    /// A surface that is not attached to any page, used for native and headless runs.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn headless(id: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            size: (width, height),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current size in physical pixels.
    pub fn size(&self) -> (u32, u32) {
        #[cfg(target_arch = "wasm32")]
        {
            (self.canvas.width(), self.canvas.height())
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            self.size
        }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn canvas(&self) -> &web_sys::HtmlCanvasElement {
        &self.canvas
    }
}
