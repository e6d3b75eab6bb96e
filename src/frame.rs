/// Opaque scene objects, in draw order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpaqueObject {
    House,
    Terrain,
}

/// Steps of a single frame.
///
/// The order is fixed; the only branch is whether the overlay is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    BeginFrame,
    ClearAndSetUp,
    DrawOpaque(OpaqueObject),
    DrawSkybox,
    DrawTranslucent,
    DrawOverlay,
    Present,
}

impl FramePhase {
    pub fn next(self, overlay_enabled: bool) -> FramePhase {
        match self {
            Self::Idle => Self::BeginFrame,
            Self::BeginFrame => Self::ClearAndSetUp,
            Self::ClearAndSetUp => Self::DrawOpaque(OpaqueObject::House),
            Self::DrawOpaque(OpaqueObject::House) => Self::DrawOpaque(OpaqueObject::Terrain),
            Self::DrawOpaque(OpaqueObject::Terrain) => Self::DrawSkybox,
            Self::DrawSkybox => Self::DrawTranslucent,
            Self::DrawTranslucent if overlay_enabled => Self::DrawOverlay,
            Self::DrawTranslucent | Self::DrawOverlay => Self::Present,
            Self::Present => Self::Idle,
        }
    }

    /// Whether this phase records commands inside the render pass.
    pub fn is_draw(self) -> bool {
        matches!(
            self,
            Self::DrawOpaque(_) | Self::DrawSkybox | Self::DrawTranslucent | Self::DrawOverlay
        )
    }
}

/// Walks one frame from `BeginFrame` through `Present`.
pub fn frame_phases(overlay_enabled: bool) -> impl Iterator<Item = FramePhase> {
    std::iter::successors(Some(FramePhase::BeginFrame), move |phase| {
        match phase.next(overlay_enabled) {
            FramePhase::Idle => None,
            next => Some(next),
        }
    })
}

/// How far a frame slot got between acquiring an image and submitting.
///
/// The slot's fence and image semaphore must be settled before the slot is
/// used again, whether or not the frame made it to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStage {
    /// The image semaphore will be signaled; the fence is still signaled.
    Acquired,
    /// The fence was reset for a submit that has not happened yet.
    FenceReset,
    /// Work is queued; it waits on the semaphore and signals the fence.
    Submitted,
}

/// Work needed to settle a slot that was abandoned before its submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRecovery {
    /// Reset the fence, then submit an empty batch that waits on the image
    /// semaphore and signals the fence.
    ResetAndRelease,
    /// Same, with the fence already reset.
    Release,
}

impl SlotStage {
    pub fn fence_reset(self) -> SlotStage {
        match self {
            Self::Acquired | Self::FenceReset => Self::FenceReset,
            Self::Submitted => Self::Submitted,
        }
    }

    pub fn recovery(self) -> Option<SlotRecovery> {
        match self {
            Self::Acquired => Some(SlotRecovery::ResetAndRelease),
            Self::FenceReset => Some(SlotRecovery::Release),
            Self::Submitted => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_without_overlay() {
        let phases = frame_phases(false).collect::<Vec<_>>();
        assert_eq!(
            phases,
            [
                FramePhase::BeginFrame,
                FramePhase::ClearAndSetUp,
                FramePhase::DrawOpaque(OpaqueObject::House),
                FramePhase::DrawOpaque(OpaqueObject::Terrain),
                FramePhase::DrawSkybox,
                FramePhase::DrawTranslucent,
                FramePhase::Present,
            ]
        );
    }

    #[test]
    fn overlay_draws_last_before_present() {
        let phases = frame_phases(true).collect::<Vec<_>>();
        assert_eq!(phases.len(), 8);
        assert_eq!(phases[6], FramePhase::DrawOverlay);
        assert_eq!(phases[7], FramePhase::Present);
    }

    #[test]
    fn cycle_returns_to_idle() {
        for overlay in [false, true] {
            let mut phase = FramePhase::Idle;
            let mut steps = 0;
            loop {
                phase = phase.next(overlay);
                steps += 1;
                if phase == FramePhase::Idle {
                    break;
                }
                assert!(steps < 16);
            }
            assert_eq!(steps, if overlay { 9 } else { 8 });
        }
    }

    #[test]
    fn skybox_follows_all_opaque_geometry() {
        let phases = frame_phases(false).collect::<Vec<_>>();
        let skybox = phases
            .iter()
            .position(|p| *p == FramePhase::DrawSkybox)
            .unwrap();
        assert!(phases[..skybox]
            .iter()
            .filter(|p| matches!(p, FramePhase::DrawOpaque(_)))
            .count()
            == 2);
        assert!(phases[skybox + 1..]
            .iter()
            .all(|p| !matches!(p, FramePhase::DrawOpaque(_))));
        assert_eq!(phases.iter().filter(|p| p.is_draw()).count(), 4);
    }

    /// Fence and semaphore of one slot as the GPU would see them.
    #[derive(Debug, PartialEq)]
    struct SlotSync {
        fence_will_signal: bool,
        semaphore_waited: bool,
    }

    fn run_slot(fail_after: Option<SlotStage>) -> SlotSync {
        let mut sync = SlotSync {
            fence_will_signal: true,
            semaphore_waited: true,
        };
        // acquire
        sync.semaphore_waited = false;
        let mut stage = SlotStage::Acquired;
        if fail_after != Some(SlotStage::Acquired) {
            sync.fence_will_signal = false;
            stage = stage.fence_reset();
            if fail_after != Some(SlotStage::FenceReset) {
                sync.fence_will_signal = true;
                sync.semaphore_waited = true;
                stage = SlotStage::Submitted;
            }
        }
        if let Some(recovery) = stage.recovery() {
            // a release never needs the fence reset twice
            assert_eq!(
                recovery == SlotRecovery::ResetAndRelease,
                sync.fence_will_signal
            );
            sync.fence_will_signal = true;
            sync.semaphore_waited = true;
        }
        sync
    }

    #[test]
    fn abandoned_frames_leave_the_slot_reusable() {
        let settled = SlotSync {
            fence_will_signal: true,
            semaphore_waited: true,
        };
        for fail_after in [None, Some(SlotStage::Acquired), Some(SlotStage::FenceReset)] {
            assert_eq!(run_slot(fail_after), settled, "failed after {fail_after:?}");
        }
    }

    #[test]
    fn only_unsubmitted_slots_need_recovery() {
        assert_eq!(
            SlotStage::Acquired.recovery(),
            Some(SlotRecovery::ResetAndRelease)
        );
        assert_eq!(SlotStage::FenceReset.recovery(), Some(SlotRecovery::Release));
        assert_eq!(SlotStage::Submitted.recovery(), None);
        assert_eq!(SlotStage::Acquired.fence_reset(), SlotStage::FenceReset);
        assert_eq!(SlotStage::Submitted.fence_reset(), SlotStage::Submitted);
    }
}
