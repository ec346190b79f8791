use crate::jvm::class_graph::{Assignable, ClassId};
use crate::jvm::{BaseType, FieldType, RefType, RenderDescriptor};
use crate::util::Width;
use std::fmt;

/// Precise kind of an `int`-like value
///
/// The JVM itself only knows about `int` on the stack and in locals, but keeping the narrower
/// kind around lets the assembler pick the right array instructions and reject (for example) a
/// `boolean` where only numbers make sense.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum IntKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
}

impl IntKind {
    pub fn base_type(self) -> BaseType {
        match self {
            IntKind::Boolean => BaseType::Boolean,
            IntKind::Byte => BaseType::Byte,
            IntKind::Char => BaseType::Char,
            IntKind::Short => BaseType::Short,
            IntKind::Int => BaseType::Int,
        }
    }
}

/// Abstract type of a value on the operand stack or in a local slot
///
/// These types are a refinement of [this hierarchy][0], with `int` split by kind, arrays folded
/// into references, and no `null` or uninitialized types.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-4.html#jvms-4.10.1.2
#[derive(Copy, Clone, Hash, Eq, PartialEq)]
pub enum ValueType<'g> {
    Int(IntKind),
    Long,
    Float,
    Double,

    /// Objects and arrays
    Reference(RefType<ClassId<'g>>),

    /// Unusable slot: the second half of a `long` or `double` local
    Top,
}

impl<'g> ValueType<'g> {
    pub const INT: Self = ValueType::Int(IntKind::Int);
    pub const BOOLEAN: Self = ValueType::Int(IntKind::Boolean);

    pub fn object(class: ClassId<'g>) -> ValueType<'g> {
        ValueType::Reference(RefType::Object(class))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, ValueType::Reference(_))
    }

    pub fn is_int_like(&self) -> bool {
        matches!(self, ValueType::Int(_))
    }

    /// The field type that values of this type have, if there is one
    pub fn field_type(&self) -> Option<FieldType<ClassId<'g>>> {
        Some(match self {
            ValueType::Int(kind) => FieldType::Base(kind.base_type()),
            ValueType::Long => FieldType::long(),
            ValueType::Float => FieldType::float(),
            ValueType::Double => FieldType::double(),
            ValueType::Reference(ref_type) => FieldType::Ref(*ref_type),
            ValueType::Top => return None,
        })
    }

    /// Primitive type, for non-reference values
    pub fn base_type(&self) -> Option<BaseType> {
        match self.field_type()? {
            FieldType::Base(base) => Some(base),
            FieldType::Ref(_) => None,
        }
    }
}

impl<'g> From<BaseType> for ValueType<'g> {
    fn from(base_type: BaseType) -> Self {
        match base_type {
            BaseType::Boolean => ValueType::Int(IntKind::Boolean),
            BaseType::Byte => ValueType::Int(IntKind::Byte),
            BaseType::Char => ValueType::Int(IntKind::Char),
            BaseType::Short => ValueType::Int(IntKind::Short),
            BaseType::Int => ValueType::Int(IntKind::Int),
            BaseType::Long => ValueType::Long,
            BaseType::Float => ValueType::Float,
            BaseType::Double => ValueType::Double,
        }
    }
}

impl<'g> From<FieldType<ClassId<'g>>> for ValueType<'g> {
    fn from(field_type: FieldType<ClassId<'g>>) -> Self {
        match field_type {
            FieldType::Base(base_type) => ValueType::from(base_type),
            FieldType::Ref(ref_type) => ValueType::Reference(ref_type),
        }
    }
}

impl<'g> Width for ValueType<'g> {
    fn width(&self) -> usize {
        match self {
            ValueType::Long | ValueType::Double => 2,
            _ => 1,
        }
    }
}

/// Operand assignability
///
///   - every `int`-like value is assignable to `int`, but the narrower kinds only accept
///     themselves
///   - references follow the class graph
///   - nothing is assignable to or from `Top`
impl<'g> Assignable for ValueType<'g> {
    fn is_assignable(&self, super_type: &Self) -> bool {
        match (self, super_type) {
            (ValueType::Int(_), ValueType::Int(IntKind::Int)) => true,
            (ValueType::Int(kind1), ValueType::Int(kind2)) => kind1 == kind2,
            (ValueType::Long, ValueType::Long)
            | (ValueType::Float, ValueType::Float)
            | (ValueType::Double, ValueType::Double) => true,
            (ValueType::Reference(ref1), ValueType::Reference(ref2)) => ref1.is_assignable(ref2),
            _ => false,
        }
    }
}

impl<'g> fmt::Display for ValueType<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Int(kind) => f.write_str(kind.base_type().keyword()),
            ValueType::Long => f.write_str("long"),
            ValueType::Float => f.write_str("float"),
            ValueType::Double => f.write_str("double"),
            ValueType::Reference(RefType::Object(class)) => write!(f, "{}", class.name),
            ValueType::Reference(array) => f.write_str(&array.render()),
            ValueType::Top => f.write_str("top"),
        }
    }
}

impl<'g> fmt::Debug for ValueType<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Render a sequence of types as `[int, long, java/lang/String]`
pub fn render_types<'a, 'g: 'a>(types: impl IntoIterator<Item = &'a ValueType<'g>>) -> String {
    let rendered: Vec<String> = types.into_iter().map(ValueType::to_string).collect();
    format!("[{}]", rendered.join(", "))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_graph::{ClassGraph, ClassGraphArenas};

    #[test]
    fn int_like_assignability() {
        let byte = ValueType::Int(IntKind::Byte);
        let char = ValueType::Int(IntKind::Char);

        assert!(byte.is_assignable(&ValueType::INT));
        assert!(ValueType::BOOLEAN.is_assignable(&ValueType::INT));
        assert!(byte.is_assignable(&byte));
        assert!(!ValueType::INT.is_assignable(&byte));
        assert!(!byte.is_assignable(&char));
        assert!(!ValueType::INT.is_assignable(&ValueType::Long));
    }

    #[test]
    fn top_is_isolated() {
        assert!(!ValueType::Top.is_assignable(&ValueType::Top));
        assert!(!ValueType::INT.is_assignable(&ValueType::Top));
        assert!(!ValueType::Top.is_assignable(&ValueType::INT));
    }

    #[test]
    fn references() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();
        let lang = &java.classes.lang;

        let string = ValueType::object(lang.string);
        let object = ValueType::object(lang.object);
        let ints = ValueType::Reference(RefType::array(FieldType::int()));

        assert!(string.is_assignable(&object));
        assert!(ints.is_assignable(&object));
        assert!(!object.is_assignable(&string));
        assert!(!ValueType::INT.is_assignable(&object));
        assert_eq!(render_types(&[string, ints, ValueType::Long]), "[java/lang/String, [I, long]");
    }

    #[test]
    fn widths() {
        assert_eq!(ValueType::Long.width(), 2);
        assert_eq!(ValueType::Double.width(), 2);
        assert_eq!(ValueType::Top.width(), 1);
        assert_eq!(ValueType::from(BaseType::Char), ValueType::Int(IntKind::Char));
    }
}
