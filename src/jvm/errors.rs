use super::code::SynLabel;
use std::fmt;

/// Failures while assembling a routine
///
/// Every variant is fatal to the routine being built: the builder keeps the last good state, but
/// callers are not expected to carry on after an error.
#[derive(Debug)]
pub enum Error {
    /// The operands on top of the stack don't fit any variant of the operation
    TypeMismatch {
        operation: &'static str,
        expected: String,
        found: String,
    },

    /// A local slot that can't be used for the operation
    InvalidLocal {
        operation: &'static str,
        slot: usize,
        reason: InvalidLocalKind,
    },

    /// The stack has fewer values than the operation needs
    StackUnderflow {
        operation: &'static str,
        required: usize,
        found: usize,
    },

    /// Two paths into a label disagree, or a label is declared without a frame to give it
    FrameConsistency {
        label: SynLabel,
        kind: FrameConsistencyKind,
    },

    /// Labels that were jumped to but never declared
    UnresolvedLabel(Vec<SynLabel>),

    /// Operation after an unconditional jump, return, or throw, before any label
    UnreachableCode { operation: &'static str },

    /// Invocation with more argument slots than `invokeinterface` can count
    TooManyArguments { method: String, slots: usize },

    MissingMember(String),
    BadDescriptor(String),
}

#[derive(Debug, PartialEq, Eq)]
pub enum InvalidLocalKind {
    /// Slot is past the end of the locals
    OutOfRange { locals: usize },

    /// Slot is the second half of a `long` or `double`
    Placeholder,

    /// There is no `this` in a static routine
    NoReceiver,

    /// Parameter index is past the end of the declared parameters
    NoSuchParameter { parameters: usize },
}

#[derive(Debug, PartialEq, Eq)]
pub enum FrameConsistencyKind {
    /// A forward jump (or fall through) brings a different frame than the one already recorded
    IncompatibleFrames { found: String, expected: String },

    /// A backward jump brings a different frame than the one the label was declared with
    BackwardJumpMismatch { found: String, expected: String },

    /// The `from` label of a jump has not been declared yet
    MissingSourceFrame(SynLabel),

    /// Label declared without any jump having referred to it
    UnreferencedLabel,

    /// Label was already declared
    AlreadyPlaced,

    /// Caller supplied frame description does not fit the frame it is relative to
    UnfitDescriptor(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TypeMismatch {
                operation,
                expected,
                found,
            } => write!(
                f,
                "{}: expected {} on the stack but found {}",
                operation, expected, found
            ),
            Error::InvalidLocal {
                operation,
                slot,
                reason,
            } => write!(f, "{}: local {} cannot be used ({})", operation, slot, reason),
            Error::StackUnderflow {
                operation,
                required,
                found,
            } => write!(
                f,
                "{}: needs {} values on the stack but there are only {}",
                operation, required, found
            ),
            Error::FrameConsistency { label, kind } => write!(f, "label {:?}: {}", label, kind),
            Error::UnresolvedLabel(labels) => {
                write!(f, "labels jumped to but never declared: {:?}", labels)
            }
            Error::UnreachableCode { operation } => write!(
                f,
                "{}: unreachable, declare a label before adding more code",
                operation
            ),
            Error::TooManyArguments { method, slots } => {
                write!(f, "{} takes {} argument slots, more than 255", method, slots)
            }
            Error::MissingMember(member) => write!(f, "cannot find member {}", member),
            Error::BadDescriptor(msg) => write!(f, "bad descriptor: {}", msg),
        }
    }
}

impl fmt::Display for InvalidLocalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidLocalKind::OutOfRange { locals } => {
                write!(f, "only {} slots are in use", locals)
            }
            InvalidLocalKind::Placeholder => f.write_str("second half of a wide value"),
            InvalidLocalKind::NoReceiver => f.write_str("routine is static"),
            InvalidLocalKind::NoSuchParameter { parameters } => {
                write!(f, "routine has {} parameters", parameters)
            }
        }
    }
}

impl fmt::Display for FrameConsistencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameConsistencyKind::IncompatibleFrames { found, expected } => {
                write!(f, "incoming frame {} does not match {}", found, expected)
            }
            FrameConsistencyKind::BackwardJumpMismatch { found, expected } => write!(
                f,
                "backward jump brings {} but the label was declared with {}",
                found, expected
            ),
            FrameConsistencyKind::MissingSourceFrame(from) => {
                write!(f, "source label {:?} has not been declared", from)
            }
            FrameConsistencyKind::UnreferencedLabel => {
                f.write_str("declared without any jump referring to it")
            }
            FrameConsistencyKind::AlreadyPlaced => f.write_str("declared twice"),
            FrameConsistencyKind::UnfitDescriptor(descriptor) => {
                write!(f, "frame {} does not fit the entry frame", descriptor)
            }
        }
    }
}

impl std::error::Error for Error {}
