use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    io::Cursor,
    rc::Rc,
};

use canvas_host::{
    Command, Engine, EngineConstructor, EngineInit, GpuContext, HostConfig, LoadError,
    FrameRequest, FrameSource, ManualFrames, Page, RenderError, Surface, TexturePipeline,
    resources::ImageSource,
    scheduler::{FrameLog, FrameTick},
};
use futures::{FutureExt, channel::oneshot, executor::LocalPool, future::LocalBoxFuture};

/// Something the engine was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Render,
    Command(Command),
}

/// Everything an engine was asked to do, in order. Clones share the record.
#[derive(Debug, Clone, Default)]
pub(crate) struct CallLog(Rc<RefCell<Vec<Call>>>);

impl CallLog {
    pub(crate) fn calls(&self) -> Vec<Call> {
        self.0.borrow().clone()
    }

    pub(crate) fn renders(&self) -> usize {
        self.0
            .borrow()
            .iter()
            .filter(|call| **call == Call::Render)
            .count()
    }

    pub(crate) fn commands(&self) -> Vec<Command> {
        self.0
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::Command(command) => Some(command.clone()),
                Call::Render => None,
            })
            .collect()
    }

    fn push(&self, call: Call) {
        self.0.borrow_mut().push(call);
    }
}

type RenderHook = Box<dyn FnMut(u64) -> anyhow::Result<()>>;

/// Accepts the camera rotations and rejects any other command.
pub(crate) struct RecordingEngine {
    log: CallLog,
    frame: u64,
    on_render: RenderHook,
}

impl RecordingEngine {
    pub(crate) fn new(log: CallLog) -> Self {
        Self::with_render(log, |_| Ok(()))
    }

    /// `on_render` runs inside every render with the zero-based frame number.
    pub(crate) fn with_render(
        log: CallLog,
        on_render: impl FnMut(u64) -> anyhow::Result<()> + 'static,
    ) -> Self {
        Self {
            log,
            frame: 0,
            on_render: Box::new(on_render),
        }
    }
}

impl Engine for RecordingEngine {
    fn render(&mut self) -> anyhow::Result<()> {
        self.log.push(Call::Render);
        let frame = self.frame;
        self.frame += 1;
        (self.on_render)(frame)
    }

    fn command(&mut self, command: &Command) -> anyhow::Result<()> {
        match command {
            Command::RotateCameraLeft | Command::RotateCameraRight => {
                self.log.push(Call::Command(command.clone()));
                Ok(())
            }
            Command::Named(name) => anyhow::bail!("unknown command `{}`", name),
        }
    }
}

pub(crate) fn constructor_of(engine: impl Engine + 'static) -> EngineConstructor<RecordingGpu> {
    Box::new(move |_: EngineInit<RecordingGpu>| {
        async move { Ok::<_, anyhow::Error>(Box::new(engine) as Box<dyn Engine>) }.boxed_local()
    })
}

pub(crate) fn failing_constructor(message: &'static str) -> EngineConstructor<RecordingGpu> {
    Box::new(move |_: EngineInit<RecordingGpu>| {
        async move { Err::<Box<dyn Engine>, _>(anyhow::anyhow!(message)) }.boxed_local()
    })
}

/// What [`RecordingGpu`] hands out instead of a real texture.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FakeTexture {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) first_texel: [u8; 4],
}

#[derive(Debug, Default)]
pub(crate) struct RecordingGpu {
    placeholders: Cell<u32>,
    uploads: Cell<u32>,
}

impl RecordingGpu {
    pub(crate) fn placeholders(&self) -> u32 {
        self.placeholders.get()
    }

    pub(crate) fn uploads(&self) -> u32 {
        self.uploads.get()
    }
}

impl GpuContext for RecordingGpu {
    type Texture = FakeTexture;

    fn placeholder(&self, _: &str, rgba: [u8; 4]) -> FakeTexture {
        self.placeholders.set(self.placeholders.get() + 1);
        FakeTexture {
            width: 1,
            height: 1,
            first_texel: rgba,
        }
    }

    fn upload(&self, _: &str, image: &image::RgbaImage) -> anyhow::Result<FakeTexture> {
        self.uploads.set(self.uploads.get() + 1);
        Ok(FakeTexture {
            width: image.width(),
            height: image.height(),
            first_texel: image.get_pixel(0, 0).0,
        })
    }
}

type Reply = oneshot::Sender<anyhow::Result<Vec<u8>>>;

/// An image source whose fetches only complete when the test says so.
#[derive(Clone, Default)]
pub(crate) struct ControlledSource {
    waiting: Rc<RefCell<HashMap<String, Vec<Reply>>>>,
}

impl ControlledSource {
    /// Fetches of `url` that have started and not been answered yet.
    pub(crate) fn waiting(&self, url: &str) -> usize {
        self.waiting.borrow().get(url).map_or(0, Vec::len)
    }

    /// Answers the oldest waiting fetch of `url`.
    pub(crate) fn resolve(&self, url: &str, bytes: Vec<u8>) {
        self.reply(url, Ok(bytes));
    }

    pub(crate) fn fail(&self, url: &str, message: &'static str) {
        self.reply(url, Err(anyhow::anyhow!(message)));
    }

    fn reply(&self, url: &str, result: anyhow::Result<Vec<u8>>) {
        let reply = self
            .waiting
            .borrow_mut()
            .get_mut(url)
            .filter(|replies| !replies.is_empty())
            .map(|replies| replies.remove(0))
            .unwrap_or_else(|| panic!("no fetch of `{}` is waiting", url));
        reply.send(result).expect("fetch was dropped");
    }
}

impl ImageSource for ControlledSource {
    fn fetch(&self, url: &str) -> LocalBoxFuture<'static, anyhow::Result<Vec<u8>>> {
        let (reply, answer) = oneshot::channel();
        self.waiting
            .borrow_mut()
            .entry(url.to_string())
            .or_default()
            .push(reply);
        let url = url.to_string();
        async move {
            answer
                .await
                .map_err(|_| anyhow::anyhow!("fetch of `{}` was abandoned", url))?
        }
        .boxed_local()
    }
}

/// A frame source whose `fail_on`-th request (zero-based) is refused.
pub(crate) struct FlakyFrames {
    requests: Rc<Cell<u32>>,
    fail_on: u32,
}

impl FlakyFrames {
    pub(crate) fn new(fail_on: u32) -> Self {
        Self {
            requests: Rc::new(Cell::new(0)),
            fail_on,
        }
    }

    /// Requests attempted so far, refused ones included.
    pub(crate) fn requests(&self) -> Rc<Cell<u32>> {
        Rc::clone(&self.requests)
    }
}

impl FrameSource for FlakyFrames {
    fn request_frame(&mut self) -> anyhow::Result<FrameRequest> {
        let attempt = self.requests.get();
        self.requests.set(attempt + 1);
        if attempt == self.fail_on {
            anyhow::bail!("display is gone");
        }
        Ok(FrameRequest::new(attempt as i32))
    }

    fn cancel_frame(&mut self, _: FrameRequest) {}
}

/// A PNG of the given size filled with one colour.
pub(crate) fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("failed to encode fixture");
    bytes.into_inner()
}

/// A headless page driven by hand: a local executor for the texture tasks, manual
/// refresh signals and an image source the test answers.
pub(crate) struct Harness {
    pub(crate) pool: LocalPool,
    pub(crate) gpu: Rc<RecordingGpu>,
    pub(crate) source: ControlledSource,
    pub(crate) frames: Rc<FrameLog>,
    pub(crate) page: Page<RecordingGpu>,
    pending_frames: Option<ManualFrames>,
    clock_ms: f64,
}

impl Harness {
    pub(crate) fn new(constructor: EngineConstructor<RecordingGpu>) -> Self {
        Self::with(HostConfig::default(), ManualFrames::new(), constructor)
    }

    pub(crate) fn with(
        config: HostConfig,
        frames: ManualFrames,
        constructor: EngineConstructor<RecordingGpu>,
    ) -> Self {
        let pool = LocalPool::new();
        let gpu = Rc::new(RecordingGpu::default());
        let source = ControlledSource::default();
        let textures = TexturePipeline::new(Rc::clone(&gpu), source.clone(), pool.spawner())
            .with_placeholder(config.placeholder_rgba);
        let page = Page::new(config, Surface::headless("canvas", 640, 480), textures, constructor);
        Self {
            pool,
            gpu,
            source,
            frames: frames.log(),
            page,
            pending_frames: Some(frames),
            clock_ms: 0.0,
        }
    }

    /// Loads the engine, driving the executor until the load has finished.
    pub(crate) fn init(&mut self) -> Result<(), LoadError> {
        let frames = self.pending_frames.take().unwrap_or_default();
        self.pool.run_until(self.page.init(Box::new(frames)))
    }

    /// Like [`init`](Self::init), but drives the loop from `frames`; `self.frames`
    /// then stays untouched.
    pub(crate) fn init_with(&mut self, frames: impl FrameSource + 'static) -> Result<(), LoadError> {
        self.pending_frames = None;
        self.pool.run_until(self.page.init(Box::new(frames)))
    }

    /// Delivers one refresh signal.
    pub(crate) fn refresh(&mut self) -> Result<(), RenderError> {
        self.clock_ms += 16.0;
        self.page.on_refresh(FrameTick::at(self.clock_ms))
    }

    /// Runs texture tasks until none can make progress.
    pub(crate) fn settle(&mut self) {
        self.pool.run_until_stalled();
    }

    pub(crate) fn textures(&self) -> &TexturePipeline<RecordingGpu> {
        self.page.textures()
    }
}
