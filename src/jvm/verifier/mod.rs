//! Type tracking for the operand stack and locals
//!
//! The JVM verifier checks every method body before running it. Straight-line code is easy for it
//! to check, but wherever control flow joins (the target of a jump) the verifier wants to be told
//! what the locals and stack look like. That description is the _stack map frame_, and the frames
//! for all join points make up the [`StackMapTable`][0] attribute.
//!
//! This module holds the pieces needed to produce those frames while assembling:
//!
//!   - [`ValueType`] is the abstract type of one local or stack entry
//!   - [`Frame`] is a snapshot of the locals and stack
//!   - [`FrameDescriptor`] is the compact form of a frame, relative to an earlier one (see
//!     [`Frame::diff`])
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.4

mod frame;
mod types;

pub use frame::*;
pub use types::*;
