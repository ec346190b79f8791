use super::{render_types, ValueType};
use crate::jvm::class_graph::Assignable;
use crate::jvm::{Error, InvalidLocalKind};
use crate::util::{total_width, Width};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Snapshot of the local variables and operand stack at a point in the code
///
/// Locals are indexed by slot: a `long` or `double` local is always followed by a `Top` entry for
/// its second half. The stack has one entry per value, whatever its width.
///
/// `previous` links back to the frame this one was computed relative to. It is only there for
/// diagnostics and is ignored by equality and hashing.
#[derive(Clone, Default)]
pub struct Frame<'g> {
    pub locals: Vec<ValueType<'g>>,
    pub stack: Vec<ValueType<'g>>,
    pub previous: Option<Rc<Frame<'g>>>,
}

impl<'g> PartialEq for Frame<'g> {
    fn eq(&self, other: &Frame<'g>) -> bool {
        self.locals == other.locals && self.stack == other.stack
    }
}

impl<'g> Eq for Frame<'g> {}

impl<'g> Hash for Frame<'g> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.locals.hash(state);
        self.stack.hash(state);
    }
}

impl<'g> fmt::Debug for Frame<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{locals: {}, stack: {}}}",
            render_types(&self.locals),
            render_types(&self.stack)
        )
    }
}

/// Compact description of a frame, relative to an earlier frame
///
/// These mirror the `StackMapTable` entry kinds, minus the offsets.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FrameDescriptor<'g> {
    /// Same locals, empty stack
    SameLocalsNoStack,

    /// Same locals, one value on the stack
    SameLocalsOneStack { stack: ValueType<'g> },

    /// Empty stack and 1 to 3 locals more than before (these are the new locals, one entry per
    /// value)
    AppendLocalsNoStack { locals: Vec<ValueType<'g>> },

    /// Empty stack and 1 to 3 locals fewer than before (these are the removed locals)
    ChopLocalsNoStack { chopped: Vec<ValueType<'g>> },

    /// Everything spelled out
    Full {
        locals: Vec<ValueType<'g>>,
        stack: Vec<ValueType<'g>>,
    },
}

impl<'g> fmt::Display for FrameDescriptor<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameDescriptor::SameLocalsNoStack => f.write_str("same"),
            FrameDescriptor::SameLocalsOneStack { stack } => write!(f, "same1 {}", stack),
            FrameDescriptor::AppendLocalsNoStack { locals } => {
                write!(f, "append {}", render_types(locals))
            }
            FrameDescriptor::ChopLocalsNoStack { chopped } => {
                write!(f, "chop {}", render_types(chopped))
            }
            FrameDescriptor::Full { locals, stack } => write!(
                f,
                "full locals={} stack={}",
                render_types(locals),
                render_types(stack)
            ),
        }
    }
}

/// Largest number of locals that `append` and `chop` descriptors can add or remove
const MAX_LOCALS_DELTA: usize = 3;

impl<'g> Frame<'g> {
    pub fn new(locals: Vec<ValueType<'g>>, stack: Vec<ValueType<'g>>) -> Frame<'g> {
        Frame {
            locals,
            stack,
            previous: None,
        }
    }

    /// Immutable copy of the current state, linked to the frame it was computed against
    pub fn snapshot(&self, previous: Option<Rc<Frame<'g>>>) -> Rc<Frame<'g>> {
        Rc::new(Frame {
            locals: self.locals.clone(),
            stack: self.stack.clone(),
            previous,
        })
    }

    /// This frame followed by the chain of frames it was computed against
    pub fn history(&self) -> impl Iterator<Item = &Frame<'g>> {
        std::iter::successors(Some(self), |frame| frame.previous.as_deref())
    }

    /// Size of the operand stack in slots
    pub fn stack_width(&self) -> usize {
        total_width(&self.stack)
    }

    /// Locals as one entry per value: the `Top` second half of each wide local is left out
    ///
    /// This is how frame descriptors count locals. A `Top` that does not follow a wide local is
    /// an unusable slot of its own and stays.
    pub fn local_values(&self) -> Vec<ValueType<'g>> {
        let mut values = Vec::with_capacity(self.locals.len());
        let mut after_wide = false;
        for local in &self.locals {
            if !(after_wide && *local == ValueType::Top) {
                values.push(*local);
            }
            after_wide = !after_wide && local.width() == 2;
        }
        values
    }

    /// Frame with these locals (one entry per value) and stack, with `Top` halves filled in
    pub fn from_values(locals: &[ValueType<'g>], stack: Vec<ValueType<'g>>) -> Frame<'g> {
        let mut frame = Frame::new(vec![], stack);
        for local in locals {
            frame.push_local(*local);
        }
        frame
    }

    /// Smallest descriptor of this frame, given the frame before it
    ///
    /// Locals are compared as values, so a `long` or `double` counts once. The checks happen in
    /// a fixed order: identical frames, then (only with an empty stack) appending or chopping up
    /// to 3 locals, then same locals with a single stack value. Anything else is described in
    /// full.
    pub fn diff(&self, previous: &Frame<'g>) -> FrameDescriptor<'g> {
        if self == previous {
            return FrameDescriptor::SameLocalsNoStack;
        }

        let these = self.local_values();
        let those = previous.local_values();

        if self.stack.is_empty() && these != those {
            let this_len = these.len();
            let prev_len = those.len();

            if this_len > prev_len && this_len - prev_len <= MAX_LOCALS_DELTA {
                let (kept, appended) = these.split_at(prev_len);
                if kept == those.as_slice() {
                    return FrameDescriptor::AppendLocalsNoStack {
                        locals: appended.to_vec(),
                    };
                }
            } else if prev_len > this_len && prev_len - this_len <= MAX_LOCALS_DELTA {
                let (kept, chopped) = those.split_at(this_len);
                if kept == these.as_slice() {
                    return FrameDescriptor::ChopLocalsNoStack {
                        chopped: chopped.to_vec(),
                    };
                }
            }
        }

        if these == those && self.stack.len() == 1 {
            return FrameDescriptor::SameLocalsOneStack {
                stack: self.stack[0],
            };
        }

        FrameDescriptor::Full {
            locals: these,
            stack: self.stack.clone(),
        }
    }

    /// Frame that a descriptor describes, relative to the frame before it
    ///
    /// `None` if the descriptor does not fit `previous` (eg. chopping more locals than there
    /// are, or chopping locals that differ from the ones named).
    pub fn apply(&self, descriptor: &FrameDescriptor<'g>) -> Option<Frame<'g>> {
        let mut locals = self.local_values();
        let stack = match descriptor {
            FrameDescriptor::SameLocalsNoStack => vec![],
            FrameDescriptor::SameLocalsOneStack { stack } => vec![*stack],
            FrameDescriptor::AppendLocalsNoStack { locals: appended } => {
                locals.extend_from_slice(appended);
                vec![]
            }
            FrameDescriptor::ChopLocalsNoStack { chopped } => {
                let kept = locals.len().checked_sub(chopped.len())?;
                if locals[kept..] != chopped[..] {
                    return None;
                }
                locals.truncate(kept);
                vec![]
            }
            FrameDescriptor::Full {
                locals: full_locals,
                stack,
            } => return Some(Frame::from_values(full_locals, stack.clone())),
        };
        Some(Frame::from_values(&locals, stack))
    }

    /// Check that the top of the stack satisfies the requirements (listed bottom to top)
    ///
    /// Nothing is popped: callers pop once every check of an operation has succeeded.
    pub fn check_operands(
        &self,
        operation: &'static str,
        requirements: &[Requirement<'g>],
    ) -> Result<(), Error> {
        let operands = self.top_operands(operation, requirements.len())?;
        let satisfied = requirements
            .iter()
            .zip(operands)
            .all(|(requirement, operand)| requirement.accepts(operand));
        if satisfied {
            Ok(())
        } else {
            let expected: Vec<String> = requirements.iter().map(Requirement::to_string).collect();
            Err(Error::TypeMismatch {
                operation,
                expected: format!("[{}]", expected.join(", ")),
                found: render_types(operands),
            })
        }
    }

    /// Topmost `count` values on the stack (bottom to top)
    pub fn top_operands(
        &self,
        operation: &'static str,
        count: usize,
    ) -> Result<&[ValueType<'g>], Error> {
        let found = self.stack.len();
        if found < count {
            Err(Error::StackUnderflow {
                operation,
                required: count,
                found,
            })
        } else {
            Ok(&self.stack[found - count..])
        }
    }

    pub fn pop_operands(&mut self, count: usize) {
        let new_len = self.stack.len().saturating_sub(count);
        self.stack.truncate(new_len);
    }

    /// Type of the local in a given slot
    pub fn local(&self, operation: &'static str, slot: usize) -> Result<ValueType<'g>, Error> {
        match self.locals.get(slot) {
            None => Err(Error::InvalidLocal {
                operation,
                slot,
                reason: InvalidLocalKind::OutOfRange {
                    locals: self.locals.len(),
                },
            }),
            Some(ValueType::Top) => Err(Error::InvalidLocal {
                operation,
                slot,
                reason: InvalidLocalKind::Placeholder,
            }),
            Some(local) => Ok(*local),
        }
    }

    /// Add a new local after the existing ones, returning its slot
    pub fn push_local(&mut self, local: ValueType<'g>) -> usize {
        let slot = self.locals.len();
        self.locals.push(local);
        if local.width() == 2 {
            self.locals.push(ValueType::Top);
        }
        slot
    }

    /// Remove the last local (both halves, if it is wide)
    pub fn pop_local(&mut self) -> Option<ValueType<'g>> {
        match self.locals.pop()? {
            ValueType::Top => match self.locals.last() {
                Some(wide) if wide.width() == 2 => self.locals.pop(),
                _ => Some(ValueType::Top),
            },
            local => Some(local),
        }
    }
}

/// What an operation needs from one operand
#[derive(Copy, Clone, Debug)]
pub enum Requirement<'g> {
    /// Any value at all
    Any,

    /// A value that takes up a single slot
    Category1,

    /// `boolean`, `byte`, `char`, `short`, or `int`
    IntLike,

    /// Like `IntLike`, but not `boolean`
    IntNumeric,

    AnyReference,
    Array,

    /// A value that can be used where this type is expected
    AssignableTo(ValueType<'g>),
}

impl<'g> Requirement<'g> {
    pub fn accepts(&self, found: &ValueType<'g>) -> bool {
        match self {
            Requirement::Any => !matches!(found, ValueType::Top),
            Requirement::Category1 => found.width() == 1 && !matches!(found, ValueType::Top),
            Requirement::IntLike => found.is_int_like(),
            Requirement::IntNumeric => {
                found.is_int_like() && *found != ValueType::BOOLEAN
            }
            Requirement::AnyReference => found.is_reference(),
            Requirement::Array => {
                matches!(found, ValueType::Reference(ref_type) if ref_type.is_array())
            }
            Requirement::AssignableTo(expected) => found.is_assignable(expected),
        }
    }
}

impl<'g> fmt::Display for Requirement<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Any => f.write_str("any value"),
            Requirement::Category1 => f.write_str("single slot value"),
            Requirement::IntLike => f.write_str("int-like"),
            Requirement::IntNumeric => f.write_str("int-like (not boolean)"),
            Requirement::AnyReference => f.write_str("reference"),
            Requirement::Array => f.write_str("array"),
            Requirement::AssignableTo(expected) => write!(f, "{}", expected),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::verifier::IntKind;
    use ValueType::*;

    fn frame<'g>(locals: &[ValueType<'g>], stack: &[ValueType<'g>]) -> Frame<'g> {
        Frame::new(locals.to_vec(), stack.to_vec())
    }

    const INT: ValueType<'static> = Int(IntKind::Int);

    #[test]
    fn same_frame() {
        let prev = frame(&[INT, Long, Top], &[]);
        assert_eq!(prev.diff(&prev), FrameDescriptor::SameLocalsNoStack);

        let with_stack = frame(&[INT], &[Float, INT]);
        assert_eq!(with_stack.diff(&with_stack), FrameDescriptor::SameLocalsNoStack);
    }

    #[test]
    fn append_and_chop() {
        let short = frame(&[INT], &[]);
        let long = frame(&[INT, Long, Top], &[]);

        assert_eq!(
            long.diff(&short),
            FrameDescriptor::AppendLocalsNoStack { locals: vec![Long] }
        );
        assert_eq!(
            short.diff(&long),
            FrameDescriptor::ChopLocalsNoStack {
                chopped: vec![Long]
            }
        );
    }

    #[test]
    fn wide_locals_count_once() {
        let empty = frame(&[], &[]);
        let two_longs = frame(&[Long, Top, Long, Top], &[]);
        assert_eq!(
            two_longs.diff(&empty),
            FrameDescriptor::AppendLocalsNoStack {
                locals: vec![Long, Long]
            }
        );

        let three = frame(&[Double, Top, INT, Long, Top], &[]);
        assert_eq!(
            three.diff(&empty),
            FrameDescriptor::AppendLocalsNoStack {
                locals: vec![Double, INT, Long]
            }
        );
        assert_eq!(
            empty.diff(&three),
            FrameDescriptor::ChopLocalsNoStack {
                chopped: vec![Double, INT, Long]
            }
        );

        let four = frame(&[Long, Top, Long, Top, Long, Top, Long, Top], &[]);
        assert_eq!(
            four.diff(&empty),
            FrameDescriptor::Full {
                locals: vec![Long, Long, Long, Long],
                stack: vec![]
            }
        );
    }

    #[test]
    fn local_values_keep_lone_tops() {
        let frame = frame(&[Top, Double, Top, Top, INT], &[]);
        assert_eq!(frame.local_values(), vec![Top, Double, Top, INT]);
        assert_eq!(
            Frame::from_values(&[Double, INT], vec![]).locals,
            vec![Double, Top, INT]
        );
    }

    #[test]
    fn applying_descriptors() {
        let prev = frame(&[INT, Long, Top], &[]);
        for cur in [
            frame(&[INT, Long, Top], &[]),
            frame(&[INT, Long, Top], &[Float]),
            frame(&[INT, Long, Top, Double, Top], &[]),
            frame(&[INT], &[]),
            frame(&[Float], &[INT, INT]),
        ] {
            assert_eq!(prev.apply(&cur.diff(&prev)), Some(cur));
        }

        let chop_wrong = FrameDescriptor::ChopLocalsNoStack {
            chopped: vec![Double],
        };
        assert_eq!(prev.apply(&chop_wrong), None);
    }

    #[test]
    fn append_limited_to_three() {
        let empty = frame(&[], &[]);
        let four = frame(&[INT, INT, INT, INT], &[]);
        assert!(matches!(four.diff(&empty), FrameDescriptor::Full { .. }));
        assert!(matches!(empty.diff(&four), FrameDescriptor::Full { .. }));
    }

    #[test]
    fn append_needs_prefix() {
        let prev = frame(&[INT], &[]);
        let cur = frame(&[Float, INT], &[]);
        assert!(matches!(cur.diff(&prev), FrameDescriptor::Full { .. }));
    }

    #[test]
    fn one_stack_value() {
        let prev = frame(&[INT], &[]);
        let cur = frame(&[INT], &[Double]);
        assert_eq!(
            cur.diff(&prev),
            FrameDescriptor::SameLocalsOneStack { stack: Double }
        );

        // Appending is only tried with an empty stack
        let grown = frame(&[INT, INT], &[Double]);
        assert!(matches!(grown.diff(&prev), FrameDescriptor::Full { .. }));
    }

    #[test]
    fn same_locals_emptied_stack() {
        let prev = frame(&[INT], &[INT, INT]);
        let cur = frame(&[INT], &[]);
        assert_eq!(
            cur.diff(&prev),
            FrameDescriptor::Full {
                locals: vec![INT],
                stack: vec![]
            }
        );
    }

    #[test]
    fn equality_ignores_history() {
        let base = frame(&[INT], &[]);
        let linked = base.snapshot(Some(Rc::new(frame(&[], &[]))));
        assert_eq!(*linked, base);
        assert_eq!(linked.history().count(), 2);
    }

    #[test]
    fn wide_locals() {
        let mut frame = frame(&[INT], &[]);
        assert_eq!(frame.push_local(Double), 1);
        assert_eq!(frame.locals, vec![INT, Double, Top]);
        assert!(matches!(
            frame.local("load", 2),
            Err(Error::InvalidLocal {
                reason: InvalidLocalKind::Placeholder,
                ..
            })
        ));
        assert_eq!(frame.pop_local(), Some(Double));
        assert_eq!(frame.locals, vec![INT]);
    }

    #[test]
    fn operand_checks_do_not_pop() {
        let frame = frame(&[], &[Long, INT]);
        assert!(frame
            .check_operands("shl", &[Requirement::AssignableTo(Long), Requirement::IntNumeric])
            .is_ok());
        assert!(matches!(
            frame.check_operands("add", &[Requirement::IntLike, Requirement::IntLike]),
            Err(Error::TypeMismatch { operation: "add", .. })
        ));
        assert!(matches!(
            frame.check_operands("swap", &[Requirement::Any; 3]),
            Err(Error::StackUnderflow {
                required: 3,
                found: 2,
                ..
            })
        ));
        assert_eq!(frame.stack.len(), 2);
    }
}
