use super::{
    CodeSize, Emission, EqComparison, Instruction, InstructionSink, LabelFrames, OrdComparison,
    RawCode, ResolvedFrame, SynLabel, SynLabelGenerator,
};
use crate::jvm::class_graph::{JavaLibrary, MethodId};
use crate::jvm::verifier::{Frame, FrameDescriptor, Requirement, ValueType};
use crate::jvm::{Error, FrameConsistencyKind, InvalidLocalKind};
use crate::util::Width;
use std::fmt;
use std::rc::Rc;

/// Assembles the body of one routine, tracking the types of the locals and operand stack as it
/// goes.
///
/// Every operation checks the top of the stack (or the locals) against what it needs, picks the
/// instruction variant that fits the types it found, and then updates the tracked state. When a
/// check fails, the state is left exactly as it was before the call.
///
/// ### Frames at labels
///
/// Instead of inferring frames with a fixpoint over the control flow graph, every jump states
/// which label its frame should be described relative to:
///
///   - a _forward_ jump names a `from` label that has already been declared, and the frame is
///     described as a diff against that label's frame
///   - a _backward_ jump has no `from` label, and the frame is described as a diff against the
///     routine's entry frame
///
/// All jumps to the same label must bring exactly the same locals and stack. Declaring the label
/// then emits the frame description recorded by the jumps.
///
/// ### Reachability
///
/// After an unconditional jump, a return, or a throw, there is no current frame. Until the next
/// label gets declared (with the frame that jumps to that label brought), every operation fails
/// with [`Error::UnreachableCode`].
pub struct CodeBuilder<'g> {
    /// Java library references
    pub java: &'g JavaLibrary<'g>,

    /// Routine whose body is being assembled
    pub method: MethodId<'g>,

    /// Frame on entry to the routine (never changes)
    initial: Rc<Frame<'g>>,

    /// Frame at the end of the code so far, or `None` if the end is unreachable
    current: Option<Frame<'g>>,

    labels: LabelFrames<'g>,

    /// Labels, frames, and instructions in code order
    emissions: Vec<Emission<'g>>,

    max_stack: usize,
    max_locals: usize,
    label_generator: SynLabelGenerator,
}

impl<'g> CodeBuilder<'g> {
    /// Create a builder for the body of a routine
    ///
    /// The locals start out holding the receiver (for instance routines) followed by the
    /// parameters.
    pub fn new(java: &'g JavaLibrary<'g>, method: MethodId<'g>) -> CodeBuilder<'g> {
        let mut entry = Frame::default();
        if !method.is_static() {
            entry.push_local(ValueType::object(method.class));
        }
        for parameter in &method.descriptor.parameters {
            entry.push_local(ValueType::from(*parameter));
        }

        let max_locals = entry.locals.len();
        let initial = Rc::new(entry);
        CodeBuilder {
            java,
            method,
            current: Some((*initial).clone()),
            initial,
            labels: LabelFrames::new(),
            emissions: vec![],
            max_stack: 0,
            max_locals,
            label_generator: SynLabelGenerator::default(),
        }
    }

    /// Generate a fresh label
    pub fn fresh_label(&mut self) -> SynLabel {
        self.label_generator.fresh_label()
    }

    /// Frame at the end of the code so far (`None` when that point is unreachable)
    pub fn current_frame(&self) -> Option<&Frame<'g>> {
        self.current.as_ref()
    }

    pub fn initial_frame(&self) -> &Frame<'g> {
        &self.initial
    }

    /// Slot of the first local after the receiver and parameters
    ///
    /// Local indices in `load_local`, `store_local_at`, and `increment` are relative to this.
    pub fn local_offset(&self) -> usize {
        self.initial.locals.len()
    }

    /// Run one operation against the current frame
    ///
    /// `update` works on a copy of the frame, so the builder is untouched if it fails. On success,
    /// the copy becomes the current frame and the code it returns is appended. In unreachable code,
    /// the operation fails with [`Error::UnreachableCode`].
    pub(super) fn tracked(
        &mut self,
        operation: &'static str,
        update: impl FnOnce(&mut Frame<'g>) -> Result<RawCode<'g>, Error>,
    ) -> Result<&mut Self, Error> {
        let mut next = self.reachable_frame(operation)?;
        let stack_width = next.stack_width() as isize;

        let code = update(&mut next)?;

        let peak = stack_width + code.max_stack_growth();
        self.max_stack = self.max_stack.max(peak.max(0) as usize);
        self.max_locals = self.max_locals.max(next.locals.len());
        let terminal = code.instructions.last().map_or(false, Instruction::is_terminal);
        for instruction in code.instructions {
            self.push_emission(Emission::Instruction(instruction));
        }
        self.current = if terminal { None } else { Some(next) };
        Ok(self)
    }

    /// Copy of the current frame, for an operation about to update it
    fn reachable_frame(&self, operation: &'static str) -> Result<Frame<'g>, Error> {
        match &self.current {
            Some(current) => Ok(current.clone()),
            None => {
                log::debug!("`{}` in unreachable code", operation);
                Err(Error::UnreachableCode { operation })
            }
        }
    }

    fn push_emission(&mut self, emission: Emission<'g>) {
        log::trace!("{}", emission);
        self.emissions.push(emission);
    }

    /// Splice in instructions that are not type checked
    ///
    /// The closure is responsible for keeping the frame in sync with the code it returns.
    pub fn manual(
        &mut self,
        generate: impl FnOnce(&mut Frame<'g>) -> RawCode<'g>,
    ) -> Result<&mut Self, Error> {
        self.tracked("manual", |frame| Ok(generate(frame)))
    }

    /// Flush the assembled code into a sink
    ///
    /// Fails if some labels were jumped to but never declared.
    pub fn finalize(self, sink: &mut impl InstructionSink<'g>) -> Result<CodeSize, Error> {
        let unresolved = self.labels.unresolved();
        if !unresolved.is_empty() {
            return Err(Error::UnresolvedLabel(unresolved));
        }
        if self.current.is_some() {
            log::warn!("control can fall off the end of {:?}", self.method.0);
        }

        for emission in &self.emissions {
            emission.send_to(sink);
        }
        let size = CodeSize {
            max_stack: self.max_stack,
            max_locals: self.max_locals,
        };
        sink.visit_end(size);
        Ok(size)
    }
}

impl<'g> fmt::Debug for CodeBuilder<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeBuilder")
            .field("method", &self.method.0)
            .field("current", &self.current)
            .field("pending", &self.labels.unresolved())
            .finish()
    }
}

/// Jumps and labels
impl<'g> CodeBuilder<'g> {
    /// Pop the operands of a jump, record the frame it brings to `to`, and emit it
    fn jump(
        &mut self,
        operation: &'static str,
        requirements: &[Requirement<'g>],
        from: Option<SynLabel>,
        to: SynLabel,
        instruction: Instruction<'g>,
    ) -> Result<&mut Self, Error> {
        let mut next = self.reachable_frame(operation)?;
        next.check_operands(operation, requirements)?;
        next.pop_operands(requirements.len());

        let (base, backward) = match from {
            Some(from) => match self.labels.placed_frame(from) {
                Some(placed) => (placed.snapshot.clone(), false),
                None => {
                    return Err(Error::FrameConsistency {
                        label: to,
                        kind: FrameConsistencyKind::MissingSourceFrame(from),
                    })
                }
            },
            None => (self.initial.clone(), true),
        };
        let descriptor = next.diff(&base);
        let snapshot = next.snapshot(Some(base));
        self.labels
            .record_jump(to, ResolvedFrame { snapshot, descriptor }, backward)?;

        let terminal = instruction.is_terminal();
        self.push_emission(Emission::Instruction(instruction));
        self.current = if terminal { None } else { Some(next) };
        Ok(self)
    }

    /// Unconditional jump
    pub fn goto(&mut self, from: Option<SynLabel>, to: SynLabel) -> Result<&mut Self, Error> {
        self.jump("goto", &[], from, to, Instruction::Goto(to))
    }

    /// Jump if an `int` compares to zero
    pub fn if_zero(
        &mut self,
        comparison: OrdComparison,
        from: Option<SynLabel>,
        to: SynLabel,
    ) -> Result<&mut Self, Error> {
        let requirements = [Requirement::IntLike];
        self.jump("if_zero", &requirements, from, to, Instruction::If(comparison, to))
    }

    /// Jump if two `int`s compare
    pub fn if_icmp(
        &mut self,
        comparison: OrdComparison,
        from: Option<SynLabel>,
        to: SynLabel,
    ) -> Result<&mut Self, Error> {
        let requirements = [Requirement::IntLike, Requirement::IntLike];
        let instruction = Instruction::IfICmp(comparison, to);
        self.jump("if_icmp", &requirements, from, to, instruction)
    }

    /// Jump if two references are (or are not) the same
    pub fn if_acmp(
        &mut self,
        comparison: EqComparison,
        from: Option<SynLabel>,
        to: SynLabel,
    ) -> Result<&mut Self, Error> {
        let requirements = [Requirement::AnyReference, Requirement::AnyReference];
        let instruction = Instruction::IfACmp(comparison, to);
        self.jump("if_acmp", &requirements, from, to, instruction)
    }

    /// Jump if a reference is (or is not) null
    pub fn if_null(
        &mut self,
        comparison: EqComparison,
        from: Option<SynLabel>,
        to: SynLabel,
    ) -> Result<&mut Self, Error> {
        let requirements = [Requirement::AnyReference];
        let instruction = Instruction::IfNull(comparison, to);
        self.jump("if_null", &requirements, from, to, instruction)
    }

    /// Frame at a label about to be declared: the fall-through frame if the current position is
    /// reachable, otherwise the frame recorded by jumps to the label.
    fn frame_at_label(&self, label: SynLabel, check_agreement: bool) -> Result<Frame<'g>, Error> {
        if self.labels.placed_frame(label).is_some() {
            return Err(Error::FrameConsistency {
                label,
                kind: FrameConsistencyKind::AlreadyPlaced,
            });
        }
        match (&self.current, self.labels.pending_frame(label)) {
            (Some(current), Some(pending)) if check_agreement && *current != *pending.snapshot => {
                Err(Error::FrameConsistency {
                    label,
                    kind: FrameConsistencyKind::IncompatibleFrames {
                        found: format!("{:?}", current),
                        expected: format!("{:?}", pending.snapshot),
                    },
                })
            }
            (Some(current), _) => Ok(current.clone()),
            (None, Some(pending)) => Ok((*pending.snapshot).clone()),
            (None, None) => Err(Error::FrameConsistency {
                label,
                kind: FrameConsistencyKind::UnreferencedLabel,
            }),
        }
    }

    fn place_label(&mut self, label: SynLabel, resolved: ResolvedFrame<'g>) -> Result<(), Error> {
        let frame = (*resolved.snapshot).clone();
        let descriptor = resolved.descriptor.clone();
        self.labels.place(label, resolved)?;
        log::debug!("placing {:?} with frame {:?}", label, frame);

        self.max_locals = self.max_locals.max(frame.locals.len());
        self.max_stack = self.max_stack.max(frame.stack_width());
        self.push_emission(Emission::Label(label));
        self.push_emission(Emission::Frame(descriptor));
        self.current = Some(frame);
        Ok(())
    }

    /// Declare a label that has already been jumped to
    ///
    /// The frame description is the one recorded by the jumps. If the code before the label
    /// falls through, it must bring the same frame.
    pub fn label(&mut self, label: SynLabel) -> Result<&mut Self, Error> {
        let _ = self.frame_at_label(label, true)?;
        let pending = match self.labels.pending_frame(label) {
            Some(pending) => pending.clone(),
            None => {
                return Err(Error::FrameConsistency {
                    label,
                    kind: FrameConsistencyKind::UnreferencedLabel,
                })
            }
        };
        self.place_label(label, pending)?;
        Ok(self)
    }

    /// Declare a label, describing its frame relative to the routine's entry frame
    pub fn label_from_entry(&mut self, label: SynLabel) -> Result<&mut Self, Error> {
        let base = self.initial.clone();
        self.label_relative_to(label, base)
    }

    /// Declare a label, describing its frame relative to the frame of the label `from`
    pub fn label_from(&mut self, from: SynLabel, label: SynLabel) -> Result<&mut Self, Error> {
        let base = match self.labels.placed_frame(from) {
            Some(placed) => placed.snapshot.clone(),
            None => {
                return Err(Error::FrameConsistency {
                    label,
                    kind: FrameConsistencyKind::MissingSourceFrame(from),
                })
            }
        };
        self.label_relative_to(label, base)
    }

    fn label_relative_to(
        &mut self,
        label: SynLabel,
        base: Rc<Frame<'g>>,
    ) -> Result<&mut Self, Error> {
        let frame = self.frame_at_label(label, true)?;
        let descriptor = frame.diff(&base);
        let snapshot = frame.snapshot(Some(base));
        self.place_label(label, ResolvedFrame { snapshot, descriptor })?;
        Ok(self)
    }

    /// Declare a label with a frame description supplied by the caller
    ///
    /// The description is emitted as is, and agreement with jumps already made to the label is
    /// not checked. This is for labels only reached by code the builder does not track (see
    /// [`CodeBuilder::manual`]): when nothing falls through and no jump was recorded, the frame
    /// after the label is the description applied to the entry frame.
    pub fn label_with(
        &mut self,
        label: SynLabel,
        descriptor: FrameDescriptor<'g>,
    ) -> Result<&mut Self, Error> {
        let frame = match self.frame_at_label(label, false) {
            Err(Error::FrameConsistency {
                kind: FrameConsistencyKind::UnreferencedLabel,
                ..
            }) => self.initial.apply(&descriptor).ok_or_else(|| Error::FrameConsistency {
                label,
                kind: FrameConsistencyKind::UnfitDescriptor(descriptor.to_string()),
            })?,
            other => other?,
        };
        let snapshot = frame.snapshot(None);
        self.place_label(label, ResolvedFrame { snapshot, descriptor })?;
        Ok(self)
    }
}

/// Stack shuffling
impl<'g> CodeBuilder<'g> {
    /// Swap the top two (single slot) values
    pub fn swap(&mut self) -> Result<&mut Self, Error> {
        self.tracked("swap", |frame| {
            let requirements = [Requirement::Category1, Requirement::Category1];
            frame.check_operands("swap", &requirements)?;
            let len = frame.stack.len();
            frame.stack.swap(len - 2, len - 1);
            Ok(vec![Instruction::Swap].into())
        })
    }

    /// Discard the top value
    pub fn pop(&mut self) -> Result<&mut Self, Error> {
        self.tracked("pop", |frame| {
            let top = frame.top_operands("pop", 1)?[0];
            frame.pop_operands(1);
            let instruction = if top.width() == 2 {
                Instruction::Pop2
            } else {
                Instruction::Pop
            };
            Ok(vec![instruction].into())
        })
    }

    /// Duplicate the top value
    pub fn dup(&mut self) -> Result<&mut Self, Error> {
        self.tracked("dup", |frame| {
            let top = frame.top_operands("dup", 1)?[0];
            frame.stack.push(top);
            let instruction = if top.width() == 2 {
                Instruction::Dup2
            } else {
                Instruction::Dup
            };
            Ok(vec![instruction].into())
        })
    }

    /// Duplicate the top value, inserting the copy beneath the second value
    pub fn dup_under(&mut self) -> Result<&mut Self, Error> {
        self.tracked("dup_under", |frame| {
            let operands = frame.top_operands("dup_under", 2)?;
            let (under, top) = (operands[0], operands[1]);
            let instruction = match (top.width(), under.width()) {
                (1, 1) => Instruction::DupX1,
                (1, _) => Instruction::DupX2,
                (_, 1) => Instruction::Dup2X1,
                _ => Instruction::Dup2X2,
            };
            let len = frame.stack.len();
            frame.stack.insert(len - 2, top);
            Ok(vec![instruction].into())
        })
    }
}

/// Locals
impl<'g> CodeBuilder<'g> {
    /// Push a copy of the receiver
    pub fn load_this(&mut self) -> Result<&mut Self, Error> {
        if self.method.is_static() {
            return Err(Error::InvalidLocal {
                operation: "load_this",
                slot: 0,
                reason: InvalidLocalKind::NoReceiver,
            });
        }
        self.load_slot("load_this", 0)
    }

    /// Push a copy of a parameter (0 is the first declared parameter, never the receiver)
    pub fn load_parameter(&mut self, index: usize) -> Result<&mut Self, Error> {
        let parameters = &self.method.descriptor.parameters;
        if index >= parameters.len() {
            return Err(Error::InvalidLocal {
                operation: "load_parameter",
                slot: index,
                reason: InvalidLocalKind::NoSuchParameter {
                    parameters: parameters.len(),
                },
            });
        }
        let receiver = usize::from(!self.method.is_static());
        let slot = receiver + crate::util::total_width(&parameters[..index]);
        self.load_slot("load_parameter", slot)
    }

    /// Push a copy of a local (relative to `local_offset`)
    pub fn load_local(&mut self, index: usize) -> Result<&mut Self, Error> {
        let slot = self.local_offset() + index;
        self.load_slot("load_local", slot)
    }

    fn load_slot(&mut self, operation: &'static str, slot: usize) -> Result<&mut Self, Error> {
        self.tracked(operation, |frame| {
            let local = frame.local(operation, slot)?;
            let index = slot_index(operation, slot)?;
            frame.stack.push(local);
            let instruction = match local {
                ValueType::Int(_) => Instruction::ILoad(index),
                ValueType::Long => Instruction::LLoad(index),
                ValueType::Float => Instruction::FLoad(index),
                ValueType::Double => Instruction::DLoad(index),
                // `Top` never gets past `Frame::local`
                ValueType::Reference(_) | ValueType::Top => Instruction::ALoad(index),
            };
            Ok(vec![instruction].into())
        })
    }

    /// Pop the top value into a new local, after all existing locals
    pub fn store_local(&mut self) -> Result<&mut Self, Error> {
        let operation = "store_local";
        self.tracked(operation, |frame| {
            frame.check_operands(operation, &[Requirement::Any])?;
            let value = frame.top_operands(operation, 1)?[0];
            frame.pop_operands(1);
            let slot = frame.push_local(value);
            let index = slot_index(operation, slot)?;
            Ok(vec![store_instruction(value, index)].into())
        })
    }

    /// Pop the top value into an existing local (relative to `local_offset`)
    ///
    /// The local keeps its type, so the value must be assignable to it.
    pub fn store_local_at(&mut self, index: usize) -> Result<&mut Self, Error> {
        let operation = "store_local_at";
        let slot = self.local_offset() + index;
        self.tracked(operation, |frame| {
            let local = frame.local(operation, slot)?;
            frame.check_operands(operation, &[Requirement::AssignableTo(local)])?;
            frame.pop_operands(1);
            let index = slot_index(operation, slot)?;
            Ok(vec![store_instruction(local, index)].into())
        })
    }

    /// Add a constant to an `int` local (relative to `local_offset`)
    pub fn increment(&mut self, index: usize, delta: i16) -> Result<&mut Self, Error> {
        let operation = "increment";
        let slot = self.local_offset() + index;
        self.tracked(operation, |frame| {
            let local = frame.local(operation, slot)?;
            if !local.is_int_like() {
                return Err(Error::TypeMismatch {
                    operation,
                    expected: String::from("int-like local"),
                    found: local.to_string(),
                });
            }
            let index = slot_index(operation, slot)?;
            Ok(vec![Instruction::IInc(index, delta)].into())
        })
    }

    /// Drop the last local (for ending the scope of a variable)
    pub fn kill_local(&mut self) -> Result<&mut Self, Error> {
        let operation = "kill_local";
        self.tracked(operation, |frame| match frame.pop_local() {
            Some(local) => {
                log::trace!("killed local of type {}", local);
                Ok(RawCode::new())
            }
            None => Err(Error::InvalidLocal {
                operation,
                slot: 0,
                reason: InvalidLocalKind::OutOfRange { locals: 0 },
            }),
        })
    }
}

fn slot_index(operation: &'static str, slot: usize) -> Result<u16, Error> {
    u16::try_from(slot).map_err(|_| Error::InvalidLocal {
        operation,
        slot,
        reason: InvalidLocalKind::OutOfRange {
            locals: usize::from(u16::MAX),
        },
    })
}

fn store_instruction<'g>(local: ValueType<'g>, index: u16) -> Instruction<'g> {
    match local {
        ValueType::Int(_) => Instruction::IStore(index),
        ValueType::Long => Instruction::LStore(index),
        ValueType::Float => Instruction::FStore(index),
        ValueType::Double => Instruction::DStore(index),
        ValueType::Reference(_) | ValueType::Top => Instruction::AStore(index),
    }
}
