//! Asynchronous texture loading.
//!
//! [`TexturePipeline::request_texture`] hands out a [`TextureResource`] right away. The
//! resource starts out `Pending` with a one-texel placeholder in its slot, so the
//! engine can bind it immediately. The image is fetched and decoded on a separate task;
//! when that task finishes the resource becomes `Ready` (exactly one upload) or
//! `Failed` (no upload, no retry).
//!
//! # Ordering
//!
//! Nothing orders a completion relative to the render loop. A frame drawn before the
//! upload shows the placeholder, a frame drawn after it shows the image. The upload
//! builds the complete texture first and then swaps it into the slot in one step, so a
//! frame never sees a partially written texture.
//!
//! Identical URLs are not deduplicated: every request produces an independent resource
//! with its own fetch.

use std::{
    cell::{Cell, Ref, RefCell},
    fmt::Debug,
    rc::{Rc, Weak},
};

use futures::{
    FutureExt,
    channel::oneshot,
    future::{LocalBoxFuture, Shared},
    task::{LocalSpawn, LocalSpawnExt},
};

use crate::{error::DecodeError, gpu::GpuContext, resources::ImageSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeState {
    Pending,
    Ready,
    Failed,
}

struct ResourceInner<T> {
    id: u64,
    source_url: String,
    state: Cell<DecodeState>,
    error: RefCell<Option<Rc<DecodeError>>>,
    texture: RefCell<T>,
    // Taken by the one and only completion.
    done: RefCell<Option<oneshot::Sender<DecodeState>>>,
    completion: Shared<oneshot::Receiver<DecodeState>>,
}

/// A texture that is being, or has been, loaded from a URL.
///
/// Cloning is cheap: all clones refer to the same slot and state.
pub struct TextureResource<T> {
    inner: Rc<ResourceInner<T>>,
}

impl<T> Clone for TextureResource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for TextureResource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureResource")
            .field("id", &self.inner.id)
            .field("source_url", &self.inner.source_url)
            .field("state", &self.inner.state.get())
            .finish()
    }
}

impl<T> TextureResource<T> {
    fn pending(id: u64, source_url: &str, placeholder: T) -> Self {
        let (done, completion) = oneshot::channel();
        Self {
            inner: Rc::new(ResourceInner {
                id,
                source_url: source_url.to_string(),
                state: Cell::new(DecodeState::Pending),
                error: RefCell::new(None),
                texture: RefCell::new(placeholder),
                done: RefCell::new(Some(done)),
                completion: completion.shared(),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn source_url(&self) -> &str {
        &self.inner.source_url
    }

    pub fn state(&self) -> DecodeState {
        self.inner.state.get()
    }

    /// Why the resource failed, once it has.
    pub fn error(&self) -> Option<Rc<DecodeError>> {
        self.inner.error.borrow().clone()
    }

    /// The texture currently in the slot: the placeholder until the upload lands.
    ///
    /// Do not hold the guard across an await point; the upload cannot land while it is
    /// held.
    pub fn texture(&self) -> Ref<'_, T> {
        self.inner.texture.borrow()
    }

    /// Resolves with the terminal state once the load has finished.
    ///
    /// Can be awaited any number of times, also after completion. If the load task is
    /// dropped before it finishes (its executor went away) and no other handle to the
    /// resource is left, this resolves to `Failed`.
    pub fn completion(&self) -> LocalBoxFuture<'static, DecodeState> {
        let url = self.inner.source_url.clone();
        Box::pin(self.inner.completion.clone().map(move |state| {
            state.unwrap_or_else(|_| {
                log::warn!("load of texture `{}` was abandoned before it finished", url);
                DecodeState::Failed
            })
        }))
    }

    /// Applies the outcome of the load. Only the first call has any effect.
    fn finish(&self, outcome: Result<T, DecodeError>) -> bool {
        let Some(done) = self.inner.done.borrow_mut().take() else {
            log::error!(
                "texture #{} ({}) completed twice; ignoring the second outcome",
                self.inner.id,
                self.inner.source_url
            );
            return false;
        };

        let outcome = outcome.and_then(|texture| match self.inner.texture.try_borrow_mut() {
            Ok(mut slot) => {
                *slot = texture;
                Ok(())
            }
            Err(_) => Err(DecodeError::Upload {
                url: self.inner.source_url.clone(),
                error: anyhow::anyhow!("texture slot is borrowed by a draw call"),
            }),
        });

        let state = match outcome {
            Ok(()) => {
                log::debug!("texture #{} ({}) ready", self.inner.id, self.inner.source_url);
                DecodeState::Ready
            }
            Err(e) => {
                log::warn!("texture #{} stays unloaded: {}", self.inner.id, e);
                *self.inner.error.borrow_mut() = Some(Rc::new(e));
                DecodeState::Failed
            }
        };
        self.inner.state.set(state);
        // Nobody awaiting the completion is fine.
        let _ = done.send(state);
        true
    }
}

struct PipelineInner<G: GpuContext> {
    gpu: Rc<G>,
    source: Box<dyn ImageSource>,
    spawner: Box<dyn LocalSpawn>,
    placeholder: Cell<[u8; 4]>,
    next_id: Cell<u64>,
    uploads: Cell<u64>,
    requested: RefCell<Vec<Weak<ResourceInner<G::Texture>>>>,
}

impl<G: GpuContext> PipelineInner<G> {
    async fn load(&self, id: u64, url: &str) -> Result<G::Texture, DecodeError> {
        let bytes = self
            .source
            .fetch(url)
            .await
            .map_err(|error| DecodeError::Fetch {
                url: url.to_string(),
                error,
            })?;

        let image = image::load_from_memory(&bytes)
            .map_err(|source| DecodeError::Decode {
                url: url.to_string(),
                source,
            })?
            .to_rgba8();

        let texture = self
            .gpu
            .upload(&format!("texture #{} ({})", id, url), &image)
            .map_err(|error| DecodeError::Upload {
                url: url.to_string(),
                error,
            })?;
        self.uploads.set(self.uploads.get() + 1);
        log::trace!(
            "uploaded {}x{} texels for texture #{}",
            image.width(),
            image.height(),
            id
        );
        Ok(texture)
    }
}

/// Loads images into GPU textures off the render path.
///
/// Clones share the same executor, source and GPU context.
pub struct TexturePipeline<G: GpuContext> {
    inner: Rc<PipelineInner<G>>,
}

impl<G: GpuContext> Clone for TexturePipeline<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<G: GpuContext> TexturePipeline<G> {
    /// `spawner` runs the load tasks. In the browser that is the microtask queue, in
    /// tests usually a [`futures::executor::LocalPool`].
    pub fn new(
        gpu: Rc<G>,
        source: impl ImageSource + 'static,
        spawner: impl LocalSpawn + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(PipelineInner {
                gpu,
                source: Box::new(source),
                spawner: Box::new(spawner),
                placeholder: Cell::new([0, 0, 255, 255]),
                next_id: Cell::new(0),
                uploads: Cell::new(0),
                requested: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn with_placeholder(self, rgba: [u8; 4]) -> Self {
        self.inner.placeholder.set(rgba);
        self
    }

    pub fn gpu(&self) -> &Rc<G> {
        &self.inner.gpu
    }

    /// Starts loading `source_url` and returns its resource in the `Pending` state.
    pub fn request_texture(&self, source_url: &str) -> TextureResource<G::Texture> {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);

        let placeholder = self.inner.gpu.placeholder(
            &format!("placeholder #{} ({})", id, source_url),
            self.inner.placeholder.get(),
        );
        let resource = TextureResource::pending(id, source_url, placeholder);
        {
            let mut requested = self.inner.requested.borrow_mut();
            requested.retain(|weak| weak.strong_count() > 0);
            requested.push(Rc::downgrade(&resource.inner));
        }
        log::debug!("requested texture #{} from {}", id, source_url);

        let pipeline = Rc::clone(&self.inner);
        let task_resource = resource.clone();
        let task = async move {
            let outcome = pipeline.load(id, task_resource.source_url()).await;
            task_resource.finish(outcome);
        };
        if let Err(e) = self.inner.spawner.spawn_local(task) {
            resource.finish(Err(DecodeError::Fetch {
                url: source_url.to_string(),
                error: anyhow::anyhow!("load task could not be spawned: {}", e),
            }));
        }

        resource
    }

    /// Number of successful uploads so far.
    pub fn uploads(&self) -> u64 {
        self.inner.uploads.get()
    }

    /// URLs of live resources that are still waiting for their image.
    pub fn pending(&self) -> Vec<String> {
        self.inner
            .requested
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|resource| resource.state.get() == DecodeState::Pending)
            .map(|resource| resource.source_url.clone())
            .collect()
    }
}
