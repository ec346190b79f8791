use super::{BinaryName, Error, Name};
use crate::util::{RefId, Width};
use std::fmt;

/// Types that have a textual JVM descriptor form (eg. `I`, `[Ljava/lang/String;`, `(IJ)V`)
pub trait RenderDescriptor {
    fn render(&self) -> String {
        let mut string = String::new();
        self.render_to(&mut string);
        string
    }

    fn render_to(&self, write_to: &mut String);
}

impl<'g, T: RenderDescriptor> RenderDescriptor for RefId<'g, T> {
    fn render_to(&self, write_to: &mut String) {
        self.0.render_to(write_to)
    }
}

impl RenderDescriptor for BinaryName {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('L');
        write_to.push_str(self.as_str());
        write_to.push(';');
    }
}

/// Primitive value types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BaseType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl BaseType {
    pub const ALL: [BaseType; 8] = [
        BaseType::Boolean,
        BaseType::Byte,
        BaseType::Char,
        BaseType::Short,
        BaseType::Int,
        BaseType::Long,
        BaseType::Float,
        BaseType::Double,
    ];

    pub const fn descriptor_char(self) -> char {
        match self {
            BaseType::Boolean => 'Z',
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Short => 'S',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Float => 'F',
            BaseType::Double => 'D',
        }
    }

    pub fn from_descriptor_char(c: char) -> Option<BaseType> {
        BaseType::ALL
            .into_iter()
            .find(|base| base.descriptor_char() == c)
    }

    /// Java keyword for the type
    pub const fn keyword(self) -> &'static str {
        match self {
            BaseType::Boolean => "boolean",
            BaseType::Byte => "byte",
            BaseType::Char => "char",
            BaseType::Short => "short",
            BaseType::Int => "int",
            BaseType::Long => "long",
            BaseType::Float => "float",
            BaseType::Double => "double",
        }
    }
}

impl Width for BaseType {
    fn width(&self) -> usize {
        match self {
            BaseType::Long | BaseType::Double => 2,
            _ => 1,
        }
    }
}

impl RenderDescriptor for BaseType {
    fn render_to(&self, write_to: &mut String) {
        write_to.push(self.descriptor_char())
    }
}

/// Reference type
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum RefType<Class> {
    Object(Class),
    ObjectArray(ArrayType<Class>),
    PrimitiveArray(ArrayType<BaseType>),
}

/// Array type, split into its innermost element type and dimension count
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ArrayType<T> {
    /// `A[]` has 0 additional dimensions, `A[][][][]` has 3
    pub additional_dimensions: usize,

    /// `A` is the element type of `A[][]`
    pub element_type: T,
}

impl<T> ArrayType<T> {
    pub fn map<T2>(&self, map_element: impl FnOnce(&T) -> T2) -> ArrayType<T2> {
        ArrayType {
            additional_dimensions: self.additional_dimensions,
            element_type: map_element(&self.element_type),
        }
    }

    /// Same element type, one less dimension (`None` if there is only one dimension)
    fn peel(&self) -> Option<ArrayType<T>>
    where
        T: Clone,
    {
        self.additional_dimensions
            .checked_sub(1)
            .map(|additional_dimensions| ArrayType {
                additional_dimensions,
                element_type: self.element_type.clone(),
            })
    }
}

impl<T: RenderDescriptor> RenderDescriptor for ArrayType<T> {
    fn render_to(&self, write_to: &mut String) {
        for _ in 0..=self.additional_dimensions {
            write_to.push('[');
        }
        self.element_type.render_to(write_to);
    }
}

impl<C: RenderDescriptor> RenderDescriptor for RefType<C> {
    fn render_to(&self, write_to: &mut String) {
        match self {
            RefType::Object(cls) => cls.render_to(write_to),
            RefType::ObjectArray(arr) => arr.render_to(write_to),
            RefType::PrimitiveArray(arr) => arr.render_to(write_to),
        }
    }
}

impl<C> RefType<C> {
    pub fn map<C2>(&self, map_class: impl FnOnce(&C) -> C2) -> RefType<C2> {
        match self {
            RefType::Object(cls) => RefType::Object(map_class(cls)),
            RefType::ObjectArray(arr) => RefType::ObjectArray(arr.map(map_class)),
            RefType::PrimitiveArray(arr) => RefType::PrimitiveArray(*arr),
        }
    }

    pub fn try_map<C2, E>(
        &self,
        map_class: impl FnOnce(&C) -> Result<C2, E>,
    ) -> Result<RefType<C2>, E> {
        Ok(match self {
            RefType::Object(cls) => RefType::Object(map_class(cls)?),
            RefType::ObjectArray(arr) => RefType::ObjectArray(ArrayType {
                additional_dimensions: arr.additional_dimensions,
                element_type: map_class(&arr.element_type)?,
            }),
            RefType::PrimitiveArray(arr) => RefType::PrimitiveArray(*arr),
        })
    }

    /// Array type whose elements are the given type
    pub fn array(component: FieldType<C>) -> RefType<C> {
        match component {
            FieldType::Base(element_type) => RefType::PrimitiveArray(ArrayType {
                additional_dimensions: 0,
                element_type,
            }),
            FieldType::Ref(RefType::Object(element_type)) => RefType::ObjectArray(ArrayType {
                additional_dimensions: 0,
                element_type,
            }),
            FieldType::Ref(RefType::ObjectArray(arr)) => RefType::ObjectArray(ArrayType {
                additional_dimensions: arr.additional_dimensions + 1,
                element_type: arr.element_type,
            }),
            FieldType::Ref(RefType::PrimitiveArray(arr)) => RefType::PrimitiveArray(ArrayType {
                additional_dimensions: arr.additional_dimensions + 1,
                element_type: arr.element_type,
            }),
        }
    }

    /// Type of the elements, if this is an array type
    pub fn component(&self) -> Option<FieldType<C>>
    where
        C: Clone,
    {
        match self {
            RefType::Object(_) => None,
            RefType::ObjectArray(arr) => Some(match arr.peel() {
                Some(inner) => FieldType::Ref(RefType::ObjectArray(inner)),
                None => FieldType::Ref(RefType::Object(arr.element_type.clone())),
            }),
            RefType::PrimitiveArray(arr) => Some(match arr.peel() {
                Some(inner) => FieldType::Ref(RefType::PrimitiveArray(inner)),
                None => FieldType::Base(arr.element_type),
            }),
        }
    }

    pub fn is_array(&self) -> bool {
        !matches!(self, RefType::Object(_))
    }
}

/// Type of a field, parameter, or local variable
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldType<Class> {
    Base(BaseType),
    Ref(RefType<Class>),
}

impl<C> Width for FieldType<C> {
    fn width(&self) -> usize {
        match self {
            FieldType::Base(base_type) => base_type.width(),
            FieldType::Ref(_) => 1,
        }
    }
}

impl<C> FieldType<C> {
    pub fn array(component: FieldType<C>) -> FieldType<C> {
        FieldType::Ref(RefType::array(component))
    }

    pub const fn object(class: C) -> FieldType<C> {
        FieldType::Ref(RefType::Object(class))
    }

    pub const fn int() -> FieldType<C> {
        FieldType::Base(BaseType::Int)
    }

    pub const fn long() -> FieldType<C> {
        FieldType::Base(BaseType::Long)
    }

    pub const fn float() -> FieldType<C> {
        FieldType::Base(BaseType::Float)
    }

    pub const fn double() -> FieldType<C> {
        FieldType::Base(BaseType::Double)
    }

    pub const fn boolean() -> FieldType<C> {
        FieldType::Base(BaseType::Boolean)
    }

    pub fn try_map<C2, E>(
        &self,
        map_class: impl FnOnce(&C) -> Result<C2, E>,
    ) -> Result<FieldType<C2>, E> {
        match self {
            FieldType::Base(base) => Ok(FieldType::Base(*base)),
            FieldType::Ref(ref_type) => ref_type.try_map(map_class).map(FieldType::Ref),
        }
    }
}

impl<C: RenderDescriptor> RenderDescriptor for FieldType<C> {
    fn render_to(&self, write_to: &mut String) {
        match self {
            FieldType::Base(base_type) => base_type.render_to(write_to),
            FieldType::Ref(ref_type) => ref_type.render_to(write_to),
        }
    }
}

/// Signature of a method
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct MethodDescriptor<Class> {
    pub parameters: Vec<FieldType<Class>>,

    /// `None` is for `void`
    pub return_type: Option<FieldType<Class>>,
}

impl<C> MethodDescriptor<C> {
    /// Number of slots the arguments take up, including the receiver if there is one
    pub fn parameter_length(&self, has_this_param: bool) -> usize {
        usize::from(has_this_param) + crate::util::total_width(&self.parameters)
    }

    pub fn try_map<C2, E>(
        &self,
        mut map_class: impl FnMut(&C) -> Result<C2, E>,
    ) -> Result<MethodDescriptor<C2>, E> {
        let parameters = self
            .parameters
            .iter()
            .map(|parameter| parameter.try_map(&mut map_class))
            .collect::<Result<Vec<_>, E>>()?;
        let return_type = match &self.return_type {
            None => None,
            Some(return_type) => Some(return_type.try_map(&mut map_class)?),
        };
        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }
}

impl<C: RenderDescriptor> RenderDescriptor for MethodDescriptor<C> {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('(');
        for parameter in &self.parameters {
            parameter.render_to(write_to);
        }
        write_to.push(')');
        match &self.return_type {
            None => write_to.push('V'),
            Some(return_type) => return_type.render_to(write_to),
        }
    }
}

impl<C: RenderDescriptor> fmt::Display for MethodDescriptor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Cursor over a descriptor string
///
/// Class names come out as plain `BinaryName`s. Resolving them against a class graph is the
/// caller's job (see `try_map`).
pub struct DescriptorParser<'s> {
    source: &'s str,
    offset: usize,
}

impl<'s> DescriptorParser<'s> {
    pub fn new(source: &'s str) -> Self {
        DescriptorParser { source, offset: 0 }
    }

    /// Parse a complete field descriptor
    pub fn field_type(source: &str) -> Result<FieldType<BinaryName>, Error> {
        let mut parser = DescriptorParser::new(source);
        let field_type = parser.next_field_type()?;
        parser.expect_end()?;
        Ok(field_type)
    }

    /// Parse a complete method descriptor
    pub fn method_descriptor(source: &str) -> Result<MethodDescriptor<BinaryName>, Error> {
        let mut parser = DescriptorParser::new(source);
        parser.expect('(')?;
        let mut parameters = vec![];
        while parser.peek() != Some(')') {
            parameters.push(parser.next_field_type()?);
        }
        parser.expect(')')?;
        let return_type = if parser.peek() == Some('V') {
            parser.bump();
            None
        } else {
            Some(parser.next_field_type()?)
        };
        parser.expect_end()?;
        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }

    fn peek(&self) -> Option<char> {
        self.source[self.offset..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.offset += c.len_utf8();
        Some(c)
    }

    fn error(&self, message: &str) -> Error {
        Error::BadDescriptor(format!(
            "{} at offset {} of '{}'",
            message, self.offset, self.source
        ))
    }

    fn expect(&mut self, expected: char) -> Result<(), Error> {
        if self.peek() == Some(expected) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", expected)))
        }
    }

    fn expect_end(&self) -> Result<(), Error> {
        if self.offset == self.source.len() {
            Ok(())
        } else {
            Err(self.error("unexpected trailing input"))
        }
    }

    fn next_class_name(&mut self) -> Result<BinaryName, Error> {
        self.expect('L')?;
        let rest = &self.source[self.offset..];
        let end = rest
            .find(';')
            .ok_or_else(|| self.error("missing ';' after class name"))?;
        let name = BinaryName::from_string(rest[..end].to_owned()).map_err(Error::BadDescriptor)?;
        self.offset += end + 1;
        Ok(name)
    }

    pub fn next_field_type(&mut self) -> Result<FieldType<BinaryName>, Error> {
        let mut dimensions = 0;
        while self.peek() == Some('[') {
            self.bump();
            dimensions += 1;
        }

        let element = match self.peek() {
            Some('L') => FieldType::object(self.next_class_name()?),
            Some(c) => match BaseType::from_descriptor_char(c) {
                Some(base) => {
                    self.bump();
                    FieldType::Base(base)
                }
                None => return Err(self.error(&format!("invalid type character '{}'", c))),
            },
            None => return Err(self.error("missing field type")),
        };

        Ok((0..dimensions).fold(element, |inner, _| FieldType::array(inner)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    type FT = FieldType<BinaryName>;

    const STRING: FT = FieldType::object(BinaryName::STRING);

    #[test]
    fn field_types() {
        assert_eq!(DescriptorParser::field_type("J").unwrap(), FT::long());
        assert_eq!(
            DescriptorParser::field_type("Ljava/lang/String;").unwrap(),
            STRING
        );
        let matrix = DescriptorParser::field_type("[[D").unwrap();
        assert_eq!(matrix, FT::array(FT::array(FT::double())));
        assert_eq!(matrix.render(), "[[D");
    }

    #[test]
    fn method_descriptors() {
        let descriptor = DescriptorParser::method_descriptor("(IJ[Ljava/lang/String;)V").unwrap();
        assert_eq!(
            descriptor,
            MethodDescriptor {
                parameters: vec![FT::int(), FT::long(), FT::array(STRING)],
                return_type: None,
            }
        );
        assert_eq!(descriptor.parameter_length(false), 4);
        assert_eq!(descriptor.parameter_length(true), 5);
    }

    #[test]
    fn malformed_descriptors() {
        assert!(matches!(
            DescriptorParser::field_type("Ljava/lang/String"),
            Err(Error::BadDescriptor(_))
        ));
        assert!(matches!(
            DescriptorParser::field_type("IJ"),
            Err(Error::BadDescriptor(_))
        ));
        assert!(matches!(
            DescriptorParser::method_descriptor("(Q)V"),
            Err(Error::BadDescriptor(_))
        ));
    }

    #[test]
    fn array_components() {
        let ints: RefType<BinaryName> = RefType::array(FT::int());
        assert_eq!(ints.component(), Some(FT::int()));

        let strings2 = RefType::array(FT::array(STRING));
        assert_eq!(strings2.component(), Some(FT::array(STRING)));
        assert_eq!(RefType::Object(BinaryName::STRING).component(), None);
    }
}
