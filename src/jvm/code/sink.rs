use super::{Instruction, SynLabel};
use crate::jvm::verifier::FrameDescriptor;
use std::fmt;

/// Space the routine needs at runtime
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct CodeSize {
    /// Deepest the operand stack gets, in slots
    pub max_stack: usize,

    /// Most local slots in use at once
    pub max_locals: usize,
}

/// Consumer of assembled code
///
/// Events arrive in code order. A label's frame (if it has one) comes right after the label.
pub trait InstructionSink<'g> {
    fn visit_label(&mut self, label: SynLabel);
    fn visit_frame(&mut self, frame: &FrameDescriptor<'g>);
    fn visit_instruction(&mut self, instruction: &Instruction<'g>);

    /// Called once, after everything else
    fn visit_end(&mut self, _size: CodeSize) {}
}

/// One event of assembled code
#[derive(Clone, Debug, PartialEq)]
pub enum Emission<'g> {
    Label(SynLabel),
    Frame(FrameDescriptor<'g>),
    Instruction(Instruction<'g>),
}

impl<'g> Emission<'g> {
    pub fn send_to(&self, sink: &mut impl InstructionSink<'g>) {
        match self {
            Emission::Label(label) => sink.visit_label(*label),
            Emission::Frame(frame) => sink.visit_frame(frame),
            Emission::Instruction(instruction) => sink.visit_instruction(instruction),
        }
    }
}

impl<'g> fmt::Display for Emission<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Emission::Label(label) => write!(f, "{:?}:", label),
            Emission::Frame(frame) => write!(f, "  [frame {}]", frame),
            Emission::Instruction(instruction) => write!(f, "  {}", instruction),
        }
    }
}

/// Sink that just records everything it is sent
#[derive(Default, Debug)]
pub struct Listing<'g> {
    pub emissions: Vec<Emission<'g>>,
    pub size: Option<CodeSize>,
}

impl<'g> Listing<'g> {
    pub fn new() -> Listing<'g> {
        Listing::default()
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction<'g>> {
        self.emissions.iter().filter_map(|emission| match emission {
            Emission::Instruction(instruction) => Some(instruction),
            _ => None,
        })
    }

    pub fn frames(&self) -> impl Iterator<Item = &FrameDescriptor<'g>> {
        self.emissions.iter().filter_map(|emission| match emission {
            Emission::Frame(frame) => Some(frame),
            _ => None,
        })
    }
}

impl<'g> InstructionSink<'g> for Listing<'g> {
    fn visit_label(&mut self, label: SynLabel) {
        self.emissions.push(Emission::Label(label));
    }

    fn visit_frame(&mut self, frame: &FrameDescriptor<'g>) {
        self.emissions.push(Emission::Frame(frame.clone()));
    }

    fn visit_instruction(&mut self, instruction: &Instruction<'g>) {
        self.emissions.push(Emission::Instruction(instruction.clone()));
    }

    fn visit_end(&mut self, size: CodeSize) {
        self.size = Some(size);
    }
}

impl<'g> fmt::Display for Listing<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for emission in &self.emissions {
            writeln!(f, "{}", emission)?;
        }
        if let Some(size) = self.size {
            writeln!(f, "  ; max_stack={} max_locals={}", size.max_stack, size.max_locals)?;
        }
        Ok(())
    }
}
