//! Instructions as the assembler emits them.
//!
//! This is slightly different from the JVM's own presentation, in ways that make it convenient to
//! select variants by type:
//!
//!   - `wide`, `ldc_w`, `goto_w` and the `iload_<n>` shortcuts don't show up. Picking an encoding
//!     is the job of whatever serializes the instructions.
//!
//!   - Families of instructions (conditional branches, shifts, floating point comparisons) are
//!     one variant with a field.
//!
//!   - Constant pool references are direct references into the class graph.

use super::SynLabel;
use crate::jvm::class_graph::{ClassId, FieldId, MethodId};
use crate::jvm::{BaseType, MethodDescriptor, RefType, RenderDescriptor, UnqualifiedName};
use crate::util::Width;
use std::fmt;
use std::ops::Not;

#[derive(Clone, Debug, PartialEq)]
pub enum Instruction<'g> {
    Nop,
    AConstNull,
    IConstM1,
    IConst0,
    IConst1,
    IConst2,
    IConst3,
    IConst4,
    IConst5,
    LConst0,
    LConst1,
    FConst0,
    FConst1,
    FConst2,
    DConst0,
    DConst1,
    BiPush(i8),
    SiPush(i16),
    Ldc(ConstantData<'g>),
    Ldc2(ConstantData<'g>),
    ILoad(u16),
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),
    IALoad,
    LALoad,
    FALoad,
    DALoad,
    AALoad,
    BALoad,
    CALoad,
    SALoad,
    IStore(u16),
    LStore(u16),
    FStore(u16),
    DStore(u16),
    AStore(u16),
    IAStore,
    LAStore,
    FAStore,
    DAStore,
    AAStore,
    BAStore,
    CAStore,
    SAStore,
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    IAdd,
    LAdd,
    FAdd,
    DAdd,
    ISub,
    LSub,
    FSub,
    DSub,
    IMul,
    LMul,
    FMul,
    DMul,
    IDiv,
    LDiv,
    FDiv,
    DDiv,
    IRem,
    LRem,
    FRem,
    DRem,
    INeg,
    LNeg,
    FNeg,
    DNeg,
    ISh(ShiftType),
    LSh(ShiftType),
    IAnd,
    LAnd,
    IOr,
    LOr,
    IXor,
    LXor,
    IInc(u16, i16),
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
    LCmp,
    FCmp(CompareMode),
    DCmp(CompareMode),
    If(OrdComparison, SynLabel),
    IfICmp(OrdComparison, SynLabel),
    IfACmp(EqComparison, SynLabel),
    IfNull(EqComparison, SynLabel),
    Goto(SynLabel),
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    AThrow,
    GetStatic(FieldId<'g>),
    PutStatic(FieldId<'g>),
    GetField(FieldId<'g>),
    PutField(FieldId<'g>),
    Invoke(InvokeType, MethodId<'g>),
    InvokeDynamic(InvokeDynamicData<'g>),
    New(ClassId<'g>),
    NewArray(BaseType),
    ANewArray(RefType<ClassId<'g>>),
    ArrayLength,
    CheckCast(RefType<ClassId<'g>>),
    InstanceOf(RefType<ClassId<'g>>),
}

impl<'g> Instruction<'g> {
    /// Net change in the operand stack, counted in slots
    pub fn stack_effect(&self) -> isize {
        use Instruction::*;
        match self {
            Nop | Swap | INeg | LNeg | FNeg | DNeg | IInc(_, _) | I2F | L2D | F2I | D2L | I2B
            | I2C | I2S | LALoad | DALoad | Goto(_) | Return | NewArray(_) | ANewArray(_)
            | ArrayLength | CheckCast(_) | InstanceOf(_) => 0,

            AConstNull | IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5
            | FConst0 | FConst1 | FConst2 | BiPush(_) | SiPush(_) | Ldc(_) | ILoad(_)
            | FLoad(_) | ALoad(_) | Dup | DupX1 | DupX2 | I2L | I2D | F2L | F2D | New(_) => 1,

            LConst0 | LConst1 | DConst0 | DConst1 | Ldc2(_) | LLoad(_) | DLoad(_) | Dup2
            | Dup2X1 | Dup2X2 => 2,

            IALoad | FALoad | AALoad | BALoad | CALoad | SALoad | IStore(_) | FStore(_)
            | AStore(_) | Pop | IAdd | FAdd | ISub | FSub | IMul | FMul | IDiv | FDiv | IRem
            | FRem | ISh(_) | LSh(_) | IAnd | IOr | IXor | L2I | L2F | D2I | D2F | FCmp(_)
            | If(_, _) | IfNull(_, _) | IReturn | FReturn | AReturn | AThrow => -1,

            LStore(_) | DStore(_) | Pop2 | LAdd | DAdd | LSub | DSub | LMul | DMul | LDiv
            | DDiv | LRem | DRem | LAnd | LOr | LXor | IfICmp(_, _) | IfACmp(_, _) | LReturn
            | DReturn => -2,

            IAStore | FAStore | AAStore | BAStore | CAStore | SAStore | LCmp | DCmp(_) => -3,

            LAStore | DAStore => -4,

            GetStatic(field) => field.descriptor.width() as isize,
            PutStatic(field) => -(field.descriptor.width() as isize),
            GetField(field) => field.descriptor.width() as isize - 1,
            PutField(field) => -(field.descriptor.width() as isize) - 1,
            Invoke(invoke_type, method) => {
                let has_receiver = *invoke_type != InvokeType::Static;
                descriptor_effect(&method.descriptor, has_receiver)
            }
            InvokeDynamic(indy) => descriptor_effect(&indy.descriptor, false),
        }
    }

    /// Does control never fall through to the next instruction?
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Instruction::Goto(_)
                | Instruction::IReturn
                | Instruction::LReturn
                | Instruction::FReturn
                | Instruction::DReturn
                | Instruction::AReturn
                | Instruction::Return
                | Instruction::AThrow
        )
    }
}

fn descriptor_effect<C>(descriptor: &MethodDescriptor<C>, has_receiver: bool) -> isize {
    let returned = descriptor.return_type.as_ref().map_or(0, Width::width) as isize;
    returned - descriptor.parameter_length(has_receiver) as isize
}

/// Name of a class as it appears in a class operand (arrays use their descriptor)
fn class_operand(ref_type: &RefType<ClassId<'_>>) -> String {
    match ref_type {
        RefType::Object(class) => class.name.to_string(),
        _ => ref_type.render(),
    }
}

impl<'g> fmt::Display for Instruction<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        match self {
            AConstNull => f.write_str("aconst_null"),
            IConstM1 => f.write_str("iconst_m1"),
            IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5 | LConst0 | LConst1
            | FConst0 | FConst1 | FConst2 | DConst0 | DConst1 => {
                // eg. `LConst1` is `lconst_1`
                let name = format!("{:?}", self).to_lowercase();
                let (prefix, n) = name.split_at(name.len() - 1);
                write!(f, "{}_{}", prefix, n)
            }
            DupX1 => f.write_str("dup_x1"),
            DupX2 => f.write_str("dup_x2"),
            Dup2X1 => f.write_str("dup2_x1"),
            Dup2X2 => f.write_str("dup2_x2"),
            BiPush(b) => write!(f, "bipush {}", b),
            SiPush(s) => write!(f, "sipush {}", s),
            Ldc(constant) => write!(f, "ldc {}", constant),
            Ldc2(constant) => write!(f, "ldc2_w {}", constant),
            ILoad(idx) => write!(f, "iload {}", idx),
            LLoad(idx) => write!(f, "lload {}", idx),
            FLoad(idx) => write!(f, "fload {}", idx),
            DLoad(idx) => write!(f, "dload {}", idx),
            ALoad(idx) => write!(f, "aload {}", idx),
            IStore(idx) => write!(f, "istore {}", idx),
            LStore(idx) => write!(f, "lstore {}", idx),
            FStore(idx) => write!(f, "fstore {}", idx),
            DStore(idx) => write!(f, "dstore {}", idx),
            AStore(idx) => write!(f, "astore {}", idx),
            ISh(shift) => write!(f, "i{}", shift),
            LSh(shift) => write!(f, "l{}", shift),
            IInc(idx, delta) => write!(f, "iinc {} {}", idx, delta),
            FCmp(mode) => write!(f, "fcmp{}", mode),
            DCmp(mode) => write!(f, "dcmp{}", mode),
            If(cmp, label) => write!(f, "if{} {:?}", cmp, label),
            IfICmp(cmp, label) => write!(f, "if_icmp{} {:?}", cmp, label),
            IfACmp(cmp, label) => write!(f, "if_acmp{} {:?}", cmp, label),
            IfNull(EqComparison::EQ, label) => write!(f, "ifnull {:?}", label),
            IfNull(EqComparison::NE, label) => write!(f, "ifnonnull {:?}", label),
            Goto(label) => write!(f, "goto {:?}", label),
            GetStatic(field) => write!(f, "getstatic {:?}", field.0),
            PutStatic(field) => write!(f, "putstatic {:?}", field.0),
            GetField(field) => write!(f, "getfield {:?}", field.0),
            PutField(field) => write!(f, "putfield {:?}", field.0),
            Invoke(invoke_type, method) => write!(f, "{} {:?}", invoke_type, method.0),
            InvokeDynamic(indy) => write!(f, "invokedynamic {}", indy),
            New(class) => write!(f, "new {}", class.name),
            NewArray(base) => write!(f, "newarray {}", base.keyword()),
            ANewArray(component) => write!(f, "anewarray {}", class_operand(component)),
            CheckCast(ref_type) => write!(f, "checkcast {}", class_operand(ref_type)),
            InstanceOf(ref_type) => write!(f, "instanceof {}", class_operand(ref_type)),
            other => {
                // Operand-free instructions print as their lowercased variant name
                let name = format!("{:?}", other).to_lowercase();
                f.write_str(&name)
            }
        }
    }
}

/// Constant pool entries that instructions and bootstrap methods can refer to
#[derive(Clone, Debug, PartialEq)]
pub enum ConstantData<'g> {
    String(String),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Class(RefType<ClassId<'g>>),
    MethodType(MethodDescriptor<ClassId<'g>>),
    MethodHandle(HandleKind, MethodId<'g>),
    FieldHandle(HandleKind, FieldId<'g>),
}

impl<'g> fmt::Display for ConstantData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantData::String(string) => write!(f, "{:?}", string),
            ConstantData::Integer(i) => write!(f, "{}", i),
            ConstantData::Long(l) => write!(f, "{}L", l),
            ConstantData::Float(x) => write!(f, "{:?}f", x),
            ConstantData::Double(d) => write!(f, "{:?}d", d),
            ConstantData::Class(ref_type) => write!(f, "{}.class", class_operand(ref_type)),
            ConstantData::MethodType(descriptor) => write!(f, "{}", descriptor),
            ConstantData::MethodHandle(kind, method) => write!(f, "{:?} {:?}", kind, method.0),
            ConstantData::FieldHandle(kind, field) => write!(f, "{:?} {:?}", kind, field.0),
        }
    }
}

/// Method handle reference kinds
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-5.html#jvms-5.4.3.5>
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum HandleKind {
    GetField,
    GetStatic,
    PutField,
    PutStatic,
    InvokeVirtual,
    InvokeStatic,
    InvokeSpecial,
    NewInvokeSpecial,
    InvokeInterface,
}

/// Call site of an `invokedynamic`, along with its bootstrap method
#[derive(Clone, Debug, PartialEq)]
pub struct InvokeDynamicData<'g> {
    pub name: UnqualifiedName,

    /// Captured values go in, the call site's result comes out
    pub descriptor: MethodDescriptor<ClassId<'g>>,

    /// Must be a static method
    pub bootstrap: MethodId<'g>,
    pub arguments: Vec<ConstantData<'g>>,
}

impl<'g> fmt::Display for InvokeDynamicData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} [{:?}", self.name, self.descriptor, self.bootstrap.0)?;
        for argument in &self.arguments {
            write!(f, ", {}", argument)?;
        }
        f.write_str("]")
    }
}

/// Possible bit shifts
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ShiftType {
    Left,
    LogicalRight,
    ArithmeticRight,
}

impl fmt::Display for ShiftType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShiftType::Left => "shl",
            ShiftType::ArithmeticRight => "shr",
            ShiftType::LogicalRight => "ushr",
        })
    }
}

/// Comparison modes for floating point
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum CompareMode {
    /// -1 on NaN
    L,

    /// 1 on NaN
    G,
}

impl fmt::Display for CompareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompareMode::L => "l",
            CompareMode::G => "g",
        })
    }
}

/// Binary comparison operators available for `int` branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum OrdComparison {
    EQ,
    NE,
    LT,
    GE,
    GT,
    LE,
}

impl OrdComparison {
    pub fn from_mnemonic(mnemonic: &str) -> Option<OrdComparison> {
        Some(match mnemonic {
            "eq" => OrdComparison::EQ,
            "ne" => OrdComparison::NE,
            "lt" => OrdComparison::LT,
            "ge" => OrdComparison::GE,
            "gt" => OrdComparison::GT,
            "le" => OrdComparison::LE,
            _ => return None,
        })
    }
}

impl Not for OrdComparison {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            OrdComparison::EQ => OrdComparison::NE,
            OrdComparison::NE => OrdComparison::EQ,
            OrdComparison::LT => OrdComparison::GE,
            OrdComparison::GE => OrdComparison::LT,
            OrdComparison::GT => OrdComparison::LE,
            OrdComparison::LE => OrdComparison::GT,
        }
    }
}

impl fmt::Display for OrdComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnemonic = format!("{:?}", self).to_lowercase();
        f.write_str(&mnemonic)
    }
}

/// Equality/inequality comparison operators
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

impl EqComparison {
    pub fn from_mnemonic(mnemonic: &str) -> Option<EqComparison> {
        match mnemonic {
            "eq" => Some(EqComparison::EQ),
            "ne" => Some(EqComparison::NE),
            _ => None,
        }
    }
}

impl Not for EqComparison {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            EqComparison::EQ => EqComparison::NE,
            EqComparison::NE => EqComparison::EQ,
        }
    }
}

impl fmt::Display for EqComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EqComparison::EQ => "eq",
            EqComparison::NE => "ne",
        })
    }
}

/// Type of method to invoke
///
/// `invokedynamic` is kept separate because it refers to a call site, not a method.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,
    Interface(u8), // `count` is of total arguments, where `long`/`double` count for 2
}

impl fmt::Display for InvokeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvokeType::Virtual => f.write_str("invokevirtual"),
            InvokeType::Special => f.write_str("invokespecial"),
            InvokeType::Static => f.write_str("invokestatic"),
            InvokeType::Interface(count) => write!(f, "invokeinterface[{}]", count),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mnemonics() {
        assert_eq!(Instruction::IAdd.to_string(), "iadd");
        assert_eq!(Instruction::Dup2X1.to_string(), "dup2_x1");
        assert_eq!(Instruction::LConst1.to_string(), "lconst_1");
        assert_eq!(Instruction::ISh(ShiftType::LogicalRight).to_string(), "iushr");
        assert_eq!(Instruction::DCmp(CompareMode::G).to_string(), "dcmpg");
        assert_eq!(
            Instruction::IfICmp(OrdComparison::LT, SynLabel::START).to_string(),
            "if_icmplt l0"
        );
        assert_eq!(
            Instruction::Ldc(ConstantData::String(String::from("hi"))).to_string(),
            "ldc \"hi\""
        );
    }

    #[test]
    fn stack_effects() {
        assert_eq!(Instruction::LConst1.stack_effect(), 2);
        assert_eq!(Instruction::LCmp.stack_effect(), -3);
        assert_eq!(Instruction::LSh(ShiftType::Left).stack_effect(), -1);
        assert_eq!(Instruction::DAStore.stack_effect(), -4);
        assert_eq!(Instruction::Dup2X2.stack_effect(), 2);
    }

    #[test]
    fn negated_comparisons() {
        assert_eq!(!OrdComparison::LT, OrdComparison::GE);
        assert_eq!(!!OrdComparison::GT, OrdComparison::GT);
        assert_eq!(!EqComparison::EQ, EqComparison::NE);
    }
}
