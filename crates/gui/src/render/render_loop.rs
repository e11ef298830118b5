//! Cancellable per-frame callback chain.
//!
//! The loop keeps exactly one frame request outstanding. The host delivers
//! frame tokens back through [`RenderLoop::tick`]; any token that is not the
//! outstanding one (cancelled, stale, or from before a restart) is ignored,
//! so nothing runs once `stop` has returned.

use crate::error::Result;

/// Identifies one requested display refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken(pub u64);

/// Per-frame scheduling primitive of the host
pub trait FrameScheduler {
    fn request_frame(&self) -> FrameToken;
    fn cancel_frame(&self, token: FrameToken);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running { pending: FrameToken },
    Stopped,
}

#[derive(Debug)]
pub struct RenderLoop {
    state: LoopState,
    frames: u64,
}

impl Default for RenderLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderLoop {
    pub fn new() -> Self {
        Self {
            state: LoopState::Idle,
            frames: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, LoopState::Running { .. })
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    /// Request the first frame. A stopped loop stays stopped.
    pub fn start(&mut self, scheduler: &dyn FrameScheduler) -> bool {
        if self.state != LoopState::Idle {
            return false;
        }
        self.state = LoopState::Running {
            pending: scheduler.request_frame(),
        };
        true
    }

    /// Run `frame` if `token` is the outstanding request, then request the
    /// next frame. Returns `Ok(false)` for ignored tokens.
    ///
    /// A failing frame stops the loop and the error is returned.
    pub fn tick<F>(
        &mut self,
        token: FrameToken,
        scheduler: &dyn FrameScheduler,
        frame: F,
    ) -> Result<bool>
    where
        F: FnOnce() -> Result<()>,
    {
        match self.state {
            LoopState::Running { pending } if pending == token => {}
            _ => return Ok(false),
        }

        if let Err(e) = frame() {
            self.state = LoopState::Stopped;
            return Err(e);
        }
        self.frames += 1;
        self.state = LoopState::Running {
            pending: scheduler.request_frame(),
        };
        Ok(true)
    }

    /// Cancel the outstanding request; no later token is honored
    pub fn stop(&mut self, scheduler: &dyn FrameScheduler) {
        if let LoopState::Running { pending } = self.state {
            scheduler.cancel_frame(pending);
        }
        self.state = LoopState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ViewerError;
    use crate::harness::ManualScheduler;

    #[test]
    fn test_start_requests_one_frame() {
        let scheduler = ManualScheduler::new();
        let mut lp = RenderLoop::new();
        assert!(!lp.is_running());
        assert!(lp.start(&scheduler));
        assert!(!lp.start(&scheduler));
        assert!(lp.is_running());
        assert_eq!(scheduler.queued(), 1);
    }

    #[test]
    fn test_tick_runs_frame_and_reschedules() {
        let scheduler = ManualScheduler::new();
        let mut lp = RenderLoop::new();
        lp.start(&scheduler);

        let mut calls = 0;
        for _ in 0..3 {
            let token = scheduler.take_next().unwrap();
            assert!(lp
                .tick(token, &scheduler, || {
                    calls += 1;
                    Ok(())
                })
                .unwrap());
        }
        assert_eq!(calls, 3);
        assert_eq!(lp.frames_rendered(), 3);
        assert_eq!(scheduler.queued(), 1);
    }

    #[test]
    fn test_stale_token_ignored() {
        let scheduler = ManualScheduler::new();
        let mut lp = RenderLoop::new();
        lp.start(&scheduler);
        let first = scheduler.take_next().unwrap();
        lp.tick(first, &scheduler, || Ok(())).unwrap();

        // Replaying the consumed token does nothing
        let ran = lp
            .tick(first, &scheduler, || panic!("stale frame ran"))
            .unwrap();
        assert!(!ran);
    }

    #[test]
    fn test_no_tick_after_stop() {
        let scheduler = ManualScheduler::new();
        let mut lp = RenderLoop::new();
        lp.start(&scheduler);
        let queued = scheduler.take_next().unwrap();

        lp.stop(&scheduler);
        assert_eq!(scheduler.cancelled(), vec![queued]);

        // The host still delivers the already-queued tick
        let ran = lp
            .tick(queued, &scheduler, || panic!("frame ran after stop"))
            .unwrap();
        assert!(!ran);
        assert_eq!(lp.state(), LoopState::Stopped);
        assert!(!lp.is_running());
        assert!(!lp.start(&scheduler));
    }

    #[test]
    fn test_failed_frame_stops_loop() {
        let scheduler = ManualScheduler::new();
        let mut lp = RenderLoop::new();
        lp.start(&scheduler);
        let token = scheduler.take_next().unwrap();

        let result = lp.tick(token, &scheduler, || {
            Err(ViewerError::Backend("lost context".into()))
        });
        assert!(matches!(result, Err(ViewerError::Backend(_))));
        assert_eq!(lp.state(), LoopState::Stopped);
        assert_eq!(scheduler.queued(), 0);
    }
}
