// SPDX-License-Identifier: GPL-3.0-only

//! Still-capture state machine
//!
//! Coordinates AF lock, AE precapture and the final capture. The machine
//! is driven by capture results delivered for every preview frame and
//! only looks at the fields relevant to its current state. It never
//! performs I/O itself: every transition returns a [`CaptureAction`] the
//! session executes against the device.
//!
//! ```text
//! Preview ──take_picture(af)──▶ Locking ──AF locked, AE ok──▶ Capturing
//!    │                             │
//!    │                      AF locked, AE not converged
//!    │                             ▼
//!    │                          Locked ──trigger sent──▶ Precapture ──▶ Waiting ──▶ Capturing
//!    └──take_picture(no af)──────────────────────────────────────────────────────▶ Capturing
//! ```
//!
//! There is no timeout: a device that never reports AE convergence keeps
//! the machine in Precapture or Waiting.

use crate::backends::camera::types::{AeState, CaptureResult};
use serde::Serialize;
use tracing::debug;

/// Capture state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureState {
    /// Repeating preview, no capture in flight
    #[default]
    Preview,
    /// AF trigger sent, waiting for focus to lock
    Locking,
    /// Focus locked, AE precapture trigger being submitted
    Locked,
    /// Precapture trigger sent, waiting for AE to start the sequence
    Precapture,
    /// Waiting for the precapture sequence to finish
    Waiting,
    /// Still capture issued
    Capturing,
}

/// Side effect requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureAction {
    None,
    /// Submit the preview request with the AF start trigger
    TriggerAutofocus,
    /// Submit the preview request with the AE precapture start trigger
    TriggerPrecapture,
    /// Build and submit the still capture request
    CaptureStill,
}

/// Why a picture request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureBusy(pub CaptureState);

#[derive(Debug, Default)]
pub struct CaptureStateMachine {
    state: CaptureState,
}

impl CaptureStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    fn set_state(&mut self, next: CaptureState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "Capture state transition");
        }
        self.state = next;
    }

    /// Start a still capture
    pub fn take_picture(&mut self, autofocus: bool) -> Result<CaptureAction, CaptureBusy> {
        if self.state != CaptureState::Preview {
            return Err(CaptureBusy(self.state));
        }
        if autofocus {
            self.set_state(CaptureState::Locking);
            Ok(CaptureAction::TriggerAutofocus)
        } else {
            self.set_state(CaptureState::Capturing);
            Ok(CaptureAction::CaptureStill)
        }
    }

    /// Feed a partial or total capture result
    pub fn on_capture_result(&mut self, result: &CaptureResult) -> CaptureAction {
        match self.state {
            CaptureState::Locking => {
                let Some(af_state) = result.af_state else {
                    return CaptureAction::None;
                };
                if !af_state.is_locked() {
                    return CaptureAction::None;
                }
                match result.ae_state {
                    None | Some(AeState::Converged) => {
                        self.set_state(CaptureState::Capturing);
                        CaptureAction::CaptureStill
                    }
                    Some(_) => {
                        self.set_state(CaptureState::Locked);
                        CaptureAction::TriggerPrecapture
                    }
                }
            }
            CaptureState::Precapture => {
                match result.ae_state {
                    None
                    | Some(AeState::Precapture)
                    | Some(AeState::FlashRequired)
                    | Some(AeState::Converged) => self.set_state(CaptureState::Waiting),
                    Some(_) => {}
                }
                CaptureAction::None
            }
            CaptureState::Waiting => {
                if result.ae_state != Some(AeState::Precapture) {
                    self.set_state(CaptureState::Capturing);
                    CaptureAction::CaptureStill
                } else {
                    CaptureAction::None
                }
            }
            CaptureState::Preview | CaptureState::Locked | CaptureState::Capturing => {
                CaptureAction::None
            }
        }
    }

    /// The precapture trigger was submitted
    pub fn precapture_triggered(&mut self) {
        if self.state == CaptureState::Locked {
            self.set_state(CaptureState::Precapture);
        }
    }

    /// Back to preview once the repeating request is re-established
    pub fn unlock(&mut self) {
        self.set_state(CaptureState::Preview);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::AfState;

    fn result(af: Option<AfState>, ae: Option<AeState>) -> CaptureResult {
        CaptureResult::preview(af, ae)
    }

    /// Drive the machine the way the session does and record the state
    /// after each step.
    fn run(autofocus: bool, results: &[CaptureResult]) -> Vec<CaptureState> {
        let mut fsm = CaptureStateMachine::new();
        let mut states = vec![fsm.state()];
        fsm.take_picture(autofocus).unwrap();
        states.push(fsm.state());
        for r in results {
            if fsm.on_capture_result(r) == CaptureAction::TriggerPrecapture {
                fsm.precapture_triggered();
            }
            if states.last() != Some(&fsm.state()) {
                states.push(fsm.state());
            }
        }
        states
    }

    #[test]
    fn test_autofocus_goes_through_locking() {
        let mut fsm = CaptureStateMachine::new();
        assert_eq!(fsm.take_picture(true), Ok(CaptureAction::TriggerAutofocus));
        assert_eq!(fsm.state(), CaptureState::Locking);
    }

    #[test]
    fn test_without_autofocus_captures_directly() {
        let mut fsm = CaptureStateMachine::new();
        assert_eq!(fsm.take_picture(false), Ok(CaptureAction::CaptureStill));
        assert_eq!(fsm.state(), CaptureState::Capturing);
    }

    #[test]
    fn test_converged_skips_precapture() {
        let states = run(
            true,
            &[result(
                Some(AfState::FocusedLocked),
                Some(AeState::Converged),
            )],
        );
        assert_eq!(
            states,
            vec![
                CaptureState::Preview,
                CaptureState::Locking,
                CaptureState::Capturing
            ]
        );
    }

    #[test]
    fn test_flash_required_runs_precapture_sequence() {
        let states = run(
            true,
            &[
                result(Some(AfState::NotFocusedLocked), Some(AeState::FlashRequired)),
                result(Some(AfState::NotFocusedLocked), Some(AeState::Precapture)),
                result(Some(AfState::NotFocusedLocked), Some(AeState::Converged)),
            ],
        );
        assert_eq!(
            states,
            vec![
                CaptureState::Preview,
                CaptureState::Locking,
                CaptureState::Precapture,
                CaptureState::Waiting,
                CaptureState::Capturing
            ]
        );
    }

    #[test]
    fn test_locking_ignores_unlocked_focus() {
        let mut fsm = CaptureStateMachine::new();
        fsm.take_picture(true).unwrap();
        let scanning = result(Some(AfState::ActiveScan), Some(AeState::Converged));
        assert_eq!(fsm.on_capture_result(&scanning), CaptureAction::None);
        assert_eq!(fsm.on_capture_result(&result(None, None)), CaptureAction::None);
        assert_eq!(fsm.state(), CaptureState::Locking);
    }

    #[test]
    fn test_locked_without_ae_state_captures() {
        let mut fsm = CaptureStateMachine::new();
        fsm.take_picture(true).unwrap();
        let action = fsm.on_capture_result(&result(Some(AfState::FocusedLocked), None));
        assert_eq!(action, CaptureAction::CaptureStill);
    }

    #[test]
    fn test_waiting_stalls_while_precapture_runs() {
        let mut fsm = CaptureStateMachine::new();
        fsm.take_picture(true).unwrap();
        fsm.on_capture_result(&result(Some(AfState::FocusedLocked), Some(AeState::Searching)));
        assert_eq!(fsm.state(), CaptureState::Locked);
        fsm.precapture_triggered();
        fsm.on_capture_result(&result(None, Some(AeState::Precapture)));
        assert_eq!(fsm.state(), CaptureState::Waiting);
        for _ in 0..10 {
            fsm.on_capture_result(&result(None, Some(AeState::Precapture)));
        }
        assert_eq!(fsm.state(), CaptureState::Waiting);
    }

    #[test]
    fn test_precapture_ignores_searching() {
        let mut fsm = CaptureStateMachine::new();
        fsm.take_picture(true).unwrap();
        fsm.on_capture_result(&result(Some(AfState::FocusedLocked), Some(AeState::Searching)));
        fsm.precapture_triggered();
        fsm.on_capture_result(&result(None, Some(AeState::Searching)));
        assert_eq!(fsm.state(), CaptureState::Precapture);
    }

    #[test]
    fn test_busy_rejects_second_picture() {
        let mut fsm = CaptureStateMachine::new();
        fsm.take_picture(true).unwrap();
        assert_eq!(fsm.take_picture(true), Err(CaptureBusy(CaptureState::Locking)));
        fsm.unlock();
        assert_eq!(fsm.state(), CaptureState::Preview);
    }

    #[test]
    fn test_preview_ignores_results() {
        let mut fsm = CaptureStateMachine::new();
        let action = fsm.on_capture_result(&result(
            Some(AfState::FocusedLocked),
            Some(AeState::Converged),
        ));
        assert_eq!(action, CaptureAction::None);
        assert_eq!(fsm.state(), CaptureState::Preview);
    }
}
