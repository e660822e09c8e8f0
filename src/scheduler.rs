//! The render loop.
//!
//! [`FrameScheduler`] is an explicit state machine instead of a self-rescheduling
//! callback chain:
//!
//! ```text
//!   Idle --start()--> Scheduled --on_refresh(): render ok, request next--> Scheduled
//!                         |  \
//!                         |   `--on_refresh(): render failed--> Halted
//!                         `--stop()--> Stopped
//! ```
//!
//! Exactly one [`FrameRequest`] is outstanding while `Scheduled`. A refresh signal
//! consumes it, the engine renders synchronously, and only then is the next request
//! issued. A render that overruns the refresh interval therefore delays the next frame
//! instead of queueing frames behind it.
//!
//! Where the refresh signal comes from is up to the [`FrameSource`]: the browser's
//! `requestAnimationFrame` (`RafFrameSource` in the `web` module) or a manual driver for
//! headless runs ([`ManualFrames`]).

use std::{cell::Cell, rc::Rc};

use instant::Instant;

use crate::{error::RenderError, session::EngineSession};

/// Token for one outstanding refresh request.
///
/// Deliberately neither `Clone` nor `Copy`: it is consumed by the refresh that answers it.
#[derive(Debug, PartialEq, Eq)]
pub struct FrameRequest(pub(crate) i32);

impl FrameRequest {
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    pub fn id(&self) -> i32 {
        self.0
    }
}

/// The refresh signal handed to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    /// Milliseconds on the page clock (`performance.now()` in the browser).
    pub timestamp_ms: f64,
}

impl FrameTick {
    pub fn at(timestamp_ms: f64) -> Self {
        Self { timestamp_ms }
    }
}

/// Delivers display refresh opportunities.
pub trait FrameSource {
    /// Ask for one refresh signal. The source later calls back into the page, which
    /// routes the signal to [`FrameScheduler::on_refresh`].
    fn request_frame(&mut self) -> anyhow::Result<FrameRequest>;

    /// Withdraw a request that has not been answered yet.
    fn cancel_frame(&mut self, request: FrameRequest);

    /// The refresh answering `request` has been handled.
    fn frame_delivered(&mut self, _request: FrameRequest) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulerState {
    Idle,
    Scheduled,
    /// A render failed; no frame is ever requested again.
    Halted,
    /// Torn down with the page.
    Stopped,
}

pub struct FrameScheduler {
    state: SchedulerState,
    pending: Option<FrameRequest>,
    source: Box<dyn FrameSource>,
    session: EngineSession,
    frames_rendered: u64,
    last_frame: Option<Instant>,
}

impl std::fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("state", &self.state)
            .field("pending", &self.pending)
            .field("frames_rendered", &self.frames_rendered)
            .finish()
    }
}

impl FrameScheduler {
    pub fn new(session: EngineSession, source: Box<dyn FrameSource>) -> Self {
        Self {
            state: SchedulerState::Idle,
            pending: None,
            source,
            session,
            frames_rendered: 0,
            last_frame: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Issues the first frame request. Only has an effect in `Idle`.
    pub fn start(&mut self) -> Result<(), RenderError> {
        if self.state != SchedulerState::Idle {
            log::warn!("render loop start ignored in state {:?}", self.state);
            return Ok(());
        }
        self.request_next()?;
        log::info!("render loop started");
        Ok(())
    }

    /// Handles one refresh signal: render once, then request the next signal.
    ///
    /// Signals that arrive without an outstanding request render nothing. A render
    /// error halts the loop and is returned to the caller.
    pub fn on_refresh(&mut self, tick: FrameTick) -> Result<(), RenderError> {
        if self.state != SchedulerState::Scheduled {
            log::trace!("refresh at {:.1}ms ignored in state {:?}", tick.timestamp_ms, self.state);
            return Ok(());
        }
        let Some(request) = self.pending.take() else {
            log::warn!("refresh at {:.1}ms arrived without a frame request", tick.timestamp_ms);
            return Ok(());
        };

        let frame = self.frames_rendered;
        if let Some(last) = self.last_frame {
            log::trace!(
                "frame {} (request {}) after {:?}",
                frame,
                request.id(),
                last.elapsed()
            );
        }
        self.last_frame = Some(Instant::now());
        self.source.frame_delivered(request);

        if let Err(e) = self.session.render(frame) {
            self.state = SchedulerState::Halted;
            log::error!("render loop halted: {}", e);
            return Err(e);
        }
        self.frames_rendered += 1;

        self.request_next()
    }

    /// Cancels the outstanding request and stops for good.
    pub fn stop(&mut self) {
        if let Some(request) = self.pending.take() {
            self.source.cancel_frame(request);
        }
        if self.state != SchedulerState::Stopped {
            log::info!("render loop stopped after {} frames", self.frames_rendered);
        }
        self.state = SchedulerState::Stopped;
    }

    fn request_next(&mut self) -> Result<(), RenderError> {
        match self.source.request_frame() {
            Ok(request) => {
                self.pending = Some(request);
                self.state = SchedulerState::Scheduled;
                Ok(())
            }
            Err(e) => {
                self.state = SchedulerState::Halted;
                let e = RenderError::Schedule(e);
                log::error!("render loop halted: {}", e);
                Err(e)
            }
        }
    }
}

/// Counters shared between a [`ManualFrames`] source and whoever drives it.
#[derive(Debug, Default)]
pub struct FrameLog {
    requested: Cell<u64>,
    delivered: Cell<u64>,
    cancelled: Cell<u64>,
    outstanding: Cell<bool>,
}

impl FrameLog {
    pub fn requested(&self) -> u64 {
        self.requested.get()
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.get()
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled.get()
    }

    /// Whether a request is waiting for its refresh signal.
    pub fn outstanding(&self) -> bool {
        self.outstanding.get()
    }
}

/// A frame source for headless runs: requests are only recorded, and the driver
/// delivers refresh signals itself by calling into the page.
#[derive(Debug, Default)]
pub struct ManualFrames {
    log: Rc<FrameLog>,
}

impl ManualFrames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> Rc<FrameLog> {
        Rc::clone(&self.log)
    }
}

impl FrameSource for ManualFrames {
    fn request_frame(&mut self) -> anyhow::Result<FrameRequest> {
        if self.log.outstanding.get() {
            anyhow::bail!("a frame request is already outstanding");
        }
        let id = self.log.requested.get();
        self.log.requested.set(id + 1);
        self.log.outstanding.set(true);
        Ok(FrameRequest(id as i32))
    }

    fn cancel_frame(&mut self, _request: FrameRequest) {
        self.log.cancelled.set(self.log.cancelled.get() + 1);
        self.log.outstanding.set(false);
    }

    fn frame_delivered(&mut self, _request: FrameRequest) {
        self.log.delivered.set(self.log.delivered.get() + 1);
        self.log.outstanding.set(false);
    }
}
