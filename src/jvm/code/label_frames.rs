use super::SynLabel;
use crate::jvm::verifier::{Frame, FrameDescriptor};
use crate::jvm::{Error, FrameConsistencyKind};
use std::collections::HashMap;
use std::rc::Rc;

/// Frame expected at a label, along with how it will be described in the output
#[derive(Clone, Debug)]
pub struct ResolvedFrame<'g> {
    pub snapshot: Rc<Frame<'g>>,
    pub descriptor: FrameDescriptor<'g>,
}

/// Tracks the frames expected at each label
///
/// A label starts out unseen. The first jump to it records a _pending_ frame, and declaring the
/// label consumes that pending frame and _places_ the label. Every later jump to the same label
/// must bring the exact same locals and stack.
#[derive(Default)]
pub struct LabelFrames<'g> {
    /// Labels that have been jumped to, but not declared (keys do not overlap with `placed`)
    pending: HashMap<SynLabel, ResolvedFrame<'g>>,

    /// Labels that have been declared
    placed: HashMap<SynLabel, ResolvedFrame<'g>>,
}

impl<'g> LabelFrames<'g> {
    pub fn new() -> LabelFrames<'g> {
        LabelFrames::default()
    }

    /// Frame of a label that has already been declared
    pub fn placed_frame(&self, label: SynLabel) -> Option<&ResolvedFrame<'g>> {
        self.placed.get(&label)
    }

    pub fn pending_frame(&self, label: SynLabel) -> Option<&ResolvedFrame<'g>> {
        self.pending.get(&label)
    }

    /// Record the frame that a jump brings to a label
    ///
    /// If the label already has a frame (pending or placed), the snapshots must agree and the
    /// existing frame is kept.
    pub fn record_jump(
        &mut self,
        to: SynLabel,
        resolved: ResolvedFrame<'g>,
        backward: bool,
    ) -> Result<(), Error> {
        let existing = self.placed.get(&to).or_else(|| self.pending.get(&to));
        match existing {
            Some(existing) if existing.snapshot != resolved.snapshot => {
                let found = format!("{:?}", resolved.snapshot);
                let expected = format!("{:?}", existing.snapshot);
                let kind = if backward {
                    FrameConsistencyKind::BackwardJumpMismatch { found, expected }
                } else {
                    FrameConsistencyKind::IncompatibleFrames { found, expected }
                };
                Err(Error::FrameConsistency { label: to, kind })
            }
            Some(_) => Ok(()),
            None => {
                log::debug!("{:?} expects {}", to, resolved.descriptor);
                self.pending.insert(to, resolved);
                Ok(())
            }
        }
    }

    /// Mark a label as declared with the given frame, consuming its pending frame
    pub fn place(&mut self, label: SynLabel, resolved: ResolvedFrame<'g>) -> Result<(), Error> {
        if self.placed.contains_key(&label) {
            return Err(Error::FrameConsistency {
                label,
                kind: FrameConsistencyKind::AlreadyPlaced,
            });
        }
        let _ = self.pending.remove(&label);
        self.placed.insert(label, resolved);
        Ok(())
    }

    /// Labels that have been jumped to but not yet declared, in label order
    pub fn unresolved(&self) -> Vec<SynLabel> {
        let mut labels: Vec<SynLabel> = self.pending.keys().copied().collect();
        labels.sort();
        labels
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::SynLabelGenerator;
    use crate::jvm::verifier::ValueType;

    fn resolved<'g>(stack: Vec<ValueType<'g>>) -> ResolvedFrame<'g> {
        let frame = Frame::new(vec![ValueType::INT], stack);
        let descriptor = frame.diff(&Frame::new(vec![ValueType::INT], vec![]));
        ResolvedFrame {
            snapshot: Rc::new(frame),
            descriptor,
        }
    }

    #[test]
    fn pending_then_placed() {
        let mut labels = SynLabelGenerator::default();
        let target = labels.fresh_label();
        let mut frames = LabelFrames::new();

        frames.record_jump(target, resolved(vec![]), false).unwrap();
        frames.record_jump(target, resolved(vec![]), false).unwrap();
        assert_eq!(frames.unresolved(), vec![target]);

        let pending = frames.pending_frame(target).cloned().unwrap();
        assert_eq!(pending.descriptor, FrameDescriptor::SameLocalsNoStack);
        frames.place(target, pending.clone()).unwrap();
        assert!(frames.unresolved().is_empty());
        assert!(frames.placed_frame(target).is_some());

        assert!(matches!(
            frames.place(target, pending),
            Err(Error::FrameConsistency {
                kind: FrameConsistencyKind::AlreadyPlaced,
                ..
            })
        ));
    }

    #[test]
    fn disagreeing_jumps() {
        let mut labels = SynLabelGenerator::default();
        let target = labels.fresh_label();
        let mut frames = LabelFrames::new();

        frames.record_jump(target, resolved(vec![]), false).unwrap();
        let forward = frames.record_jump(target, resolved(vec![ValueType::Long]), false);
        assert!(matches!(
            forward,
            Err(Error::FrameConsistency {
                kind: FrameConsistencyKind::IncompatibleFrames { .. },
                ..
            })
        ));

        let backward = frames.record_jump(target, resolved(vec![ValueType::Float]), true);
        assert!(matches!(
            backward,
            Err(Error::FrameConsistency {
                kind: FrameConsistencyKind::BackwardJumpMismatch { .. },
                ..
            })
        ));
    }
}
