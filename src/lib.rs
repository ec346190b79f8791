//! Type-tracking assembler for JVM routine bodies
//!
//! The interesting part is [`jvm::code::CodeBuilder`], which checks every operation against the
//! types on the operand stack and in the locals, and works out the stack map frames needed at
//! each label along the way. [`script`] is a small text front end for it.

pub mod jvm;
pub mod script;
pub mod util;
