//! Assembling routine bodies
//!
//! [`CodeBuilder`] is the entry point: it accepts typed operations (`add`, `get_field`, `goto`,
//! ...), picks the concrete JVM instruction for the types on the stack, and records the stack map
//! frame each label needs. Once the body is done, [`CodeBuilder::finalize`] replays everything into
//! an [`InstructionSink`].

mod code_builder;
mod instructions;
mod label;
mod label_frames;
mod operations;
mod raw;
mod sink;

pub use code_builder::*;
pub use instructions::*;
pub use label::*;
pub use label_frames::*;
pub use raw::*;
pub use sink::*;
