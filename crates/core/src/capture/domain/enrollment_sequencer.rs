use crate::shared::pose_angle::PoseAngle;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnrollmentState {
    NotStarted,
    Capturing(PoseAngle),
    AllCaptured,
}

/// Result of confirming a successful capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advance {
    Next(PoseAngle),
    Complete,
}

/// Per-angle completion flags for one session. Flags only go false to true.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AngleStatus {
    entries: Vec<(PoseAngle, bool)>,
}

impl AngleStatus {
    fn new(sequence: &[PoseAngle]) -> Self {
        Self {
            entries: sequence.iter().map(|a| (*a, false)).collect(),
        }
    }

    pub fn is_captured(&self, angle: PoseAngle) -> bool {
        self.entries.iter().any(|(a, done)| *a == angle && *done)
    }

    fn mark(&mut self, angle: PoseAngle) {
        if let Some(entry) = self.entries.iter_mut().find(|(a, _)| *a == angle) {
            entry.1 = true;
        }
    }

    pub fn captured_count(&self) -> usize {
        self.entries.iter().filter(|(_, done)| *done).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PoseAngle, bool)> + '_ {
        self.entries.iter().copied()
    }
}

/// Ordered walk over the required angles.
///
/// The target only ever moves forward, one angle per confirmed success.
/// Confirmations for anything other than the current target are stale and
/// change nothing.
#[derive(Clone, Debug)]
pub struct EnrollmentSequencer {
    sequence: Vec<PoseAngle>,
    state: EnrollmentState,
    status: AngleStatus,
}

impl EnrollmentSequencer {
    pub fn new(sequence: Vec<PoseAngle>) -> Self {
        let status = AngleStatus::new(&sequence);
        Self {
            sequence,
            state: EnrollmentState::NotStarted,
            status,
        }
    }

    pub fn state(&self) -> EnrollmentState {
        self.state
    }

    pub fn status(&self) -> &AngleStatus {
        &self.status
    }

    pub fn sequence(&self) -> &[PoseAngle] {
        &self.sequence
    }

    pub fn target(&self) -> Option<PoseAngle> {
        match self.state {
            EnrollmentState::Capturing(angle) => Some(angle),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == EnrollmentState::AllCaptured
    }

    /// Begins a fresh session from the first angle, clearing all flags.
    ///
    /// Returns `None` only for an empty sequence.
    pub fn start(&mut self) -> Option<PoseAngle> {
        self.status = AngleStatus::new(&self.sequence);
        let first = *self.sequence.first()?;
        self.state = EnrollmentState::Capturing(first);
        Some(first)
    }

    /// Applies a successful capture of `angle`.
    pub fn confirm(&mut self, angle: PoseAngle) -> Option<Advance> {
        if self.target() != Some(angle) {
            return None;
        }
        self.status.mark(angle);

        let position = self.sequence.iter().position(|a| *a == angle)?;
        match self.sequence.get(position + 1) {
            Some(&next) => {
                self.state = EnrollmentState::Capturing(next);
                Some(Advance::Next(next))
            }
            None => {
                self.state = EnrollmentState::AllCaptured;
                Some(Advance::Complete)
            }
        }
    }
}

impl Default for EnrollmentSequencer {
    fn default() -> Self {
        Self::new(PoseAngle::ALL.to_vec())
    }
}
