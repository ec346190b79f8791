//! Typed operations of [`CodeBuilder`]
//!
//! Each operation looks at the types on top of the stack to pick its instruction. Where several
//! categories of operands would do (eg. `add` works on `int`, `long`, `float`, and `double`), the
//! categories are tried in a fixed order and the first one that matches every operand wins.

use super::{
    CodeBuilder, CompareMode, ConstantData, HandleKind, Instruction, InvokeDynamicData,
    InvokeType, RawCode, ShiftType,
};
use crate::jvm::class_graph::{ClassId, FieldId, MethodId};
use crate::jvm::verifier::{render_types, Frame, IntKind, Requirement, ValueType};
use crate::jvm::{BaseType, Error, FieldType, MethodDescriptor, RefType};

/// Categories of values that arithmetic works on
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum NumericCategory {
    Int,
    Long,
    Float,
    Double,
}

impl NumericCategory {
    const ALL: [NumericCategory; 4] = [
        NumericCategory::Int,
        NumericCategory::Long,
        NumericCategory::Float,
        NumericCategory::Double,
    ];
    const INTEGRAL: [NumericCategory; 2] = [NumericCategory::Int, NumericCategory::Long];

    fn value_type<'g>(self) -> ValueType<'g> {
        match self {
            NumericCategory::Int => ValueType::INT,
            NumericCategory::Long => ValueType::Long,
            NumericCategory::Float => ValueType::Float,
            NumericCategory::Double => ValueType::Double,
        }
    }

    /// Category of a value, if it is numeric (`boolean` only counts when `allow_boolean` is set)
    fn of(value: &ValueType<'_>, allow_boolean: bool) -> Option<NumericCategory> {
        match value {
            ValueType::Int(IntKind::Boolean) if !allow_boolean => None,
            ValueType::Int(_) => Some(NumericCategory::Int),
            ValueType::Long => Some(NumericCategory::Long),
            ValueType::Float => Some(NumericCategory::Float),
            ValueType::Double => Some(NumericCategory::Double),
            ValueType::Reference(_) | ValueType::Top => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            NumericCategory::Int => "int-like",
            NumericCategory::Long => "long",
            NumericCategory::Float => "float",
            NumericCategory::Double => "double",
        }
    }
}

fn mismatch(operation: &'static str, expected: impl Into<String>, found: &[ValueType]) -> Error {
    Error::TypeMismatch {
        operation,
        expected: expected.into(),
        found: render_types(found),
    }
}

/// Arithmetic, comparisons, and conversions
impl<'g> CodeBuilder<'g> {
    /// Pop `operands` values of the same numeric category and push one result of that category
    fn arithmetic(
        &mut self,
        operation: &'static str,
        operands: usize,
        categories: &[NumericCategory],
        allow_boolean: bool,
        select: impl FnOnce(NumericCategory) -> Instruction<'g>,
    ) -> Result<&mut Self, Error> {
        self.tracked(operation, |frame| {
            let found = frame.top_operands(operation, operands)?;
            let category = categories.iter().copied().find(|category| {
                found
                    .iter()
                    .all(|operand| NumericCategory::of(operand, allow_boolean) == Some(*category))
            });
            match category {
                Some(category) => {
                    frame.pop_operands(operands);
                    frame.stack.push(category.value_type());
                    Ok(vec![select(category)].into())
                }
                None => {
                    let names: Vec<&str> = categories.iter().map(|c| c.name()).collect();
                    let expected = format!("{} operands, all {}", operands, names.join(" or "));
                    Err(mismatch(operation, expected, found))
                }
            }
        })
    }

    pub fn add(&mut self) -> Result<&mut Self, Error> {
        self.arithmetic("add", 2, &NumericCategory::ALL, true, |category| match category {
            NumericCategory::Int => Instruction::IAdd,
            NumericCategory::Long => Instruction::LAdd,
            NumericCategory::Float => Instruction::FAdd,
            NumericCategory::Double => Instruction::DAdd,
        })
    }

    pub fn sub(&mut self) -> Result<&mut Self, Error> {
        self.arithmetic("sub", 2, &NumericCategory::ALL, true, |category| match category {
            NumericCategory::Int => Instruction::ISub,
            NumericCategory::Long => Instruction::LSub,
            NumericCategory::Float => Instruction::FSub,
            NumericCategory::Double => Instruction::DSub,
        })
    }

    pub fn mul(&mut self) -> Result<&mut Self, Error> {
        self.arithmetic("mul", 2, &NumericCategory::ALL, true, |category| match category {
            NumericCategory::Int => Instruction::IMul,
            NumericCategory::Long => Instruction::LMul,
            NumericCategory::Float => Instruction::FMul,
            NumericCategory::Double => Instruction::DMul,
        })
    }

    pub fn div(&mut self) -> Result<&mut Self, Error> {
        self.arithmetic("div", 2, &NumericCategory::ALL, true, |category| match category {
            NumericCategory::Int => Instruction::IDiv,
            NumericCategory::Long => Instruction::LDiv,
            NumericCategory::Float => Instruction::FDiv,
            NumericCategory::Double => Instruction::DDiv,
        })
    }

    pub fn rem(&mut self) -> Result<&mut Self, Error> {
        self.arithmetic("rem", 2, &NumericCategory::ALL, true, |category| match category {
            NumericCategory::Int => Instruction::IRem,
            NumericCategory::Long => Instruction::LRem,
            NumericCategory::Float => Instruction::FRem,
            NumericCategory::Double => Instruction::DRem,
        })
    }

    pub fn neg(&mut self) -> Result<&mut Self, Error> {
        self.arithmetic("neg", 1, &NumericCategory::ALL, false, |category| match category {
            NumericCategory::Int => Instruction::INeg,
            NumericCategory::Long => Instruction::LNeg,
            NumericCategory::Float => Instruction::FNeg,
            NumericCategory::Double => Instruction::DNeg,
        })
    }

    pub fn and(&mut self) -> Result<&mut Self, Error> {
        self.arithmetic("and", 2, &NumericCategory::INTEGRAL, true, |category| {
            if category == NumericCategory::Int {
                Instruction::IAnd
            } else {
                Instruction::LAnd
            }
        })
    }

    pub fn or(&mut self) -> Result<&mut Self, Error> {
        self.arithmetic("or", 2, &NumericCategory::INTEGRAL, true, |category| {
            if category == NumericCategory::Int {
                Instruction::IOr
            } else {
                Instruction::LOr
            }
        })
    }

    pub fn xor(&mut self) -> Result<&mut Self, Error> {
        self.arithmetic("xor", 2, &NumericCategory::INTEGRAL, true, |category| {
            if category == NumericCategory::Int {
                Instruction::IXor
            } else {
                Instruction::LXor
            }
        })
    }

    /// Shift an `int` or `long` by an `int` distance
    fn shift(&mut self, operation: &'static str, shift: ShiftType) -> Result<&mut Self, Error> {
        self.tracked(operation, |frame| {
            let found = frame.top_operands(operation, 2)?;
            let distance = NumericCategory::of(&found[1], false);
            let (category, instruction) = match (NumericCategory::of(&found[0], false), distance) {
                (Some(NumericCategory::Int), Some(NumericCategory::Int)) => {
                    (NumericCategory::Int, Instruction::ISh(shift))
                }
                (Some(NumericCategory::Long), Some(NumericCategory::Int)) => {
                    (NumericCategory::Long, Instruction::LSh(shift))
                }
                _ => {
                    let expected = "int-like or long value, then int-like distance";
                    return Err(mismatch(operation, expected, found));
                }
            };
            frame.pop_operands(2);
            frame.stack.push(category.value_type());
            Ok(vec![instruction].into())
        })
    }

    pub fn shl(&mut self) -> Result<&mut Self, Error> {
        self.shift("shl", ShiftType::Left)
    }

    pub fn shr(&mut self) -> Result<&mut Self, Error> {
        self.shift("shr", ShiftType::ArithmeticRight)
    }

    pub fn ushr(&mut self) -> Result<&mut Self, Error> {
        self.shift("ushr", ShiftType::LogicalRight)
    }

    /// Compare two `long`s, `float`s, or `double`s, pushing -1, 0, or 1
    ///
    /// For floating point, `nan_is_greater` decides whether a NaN operand makes the result 1
    /// (`cmpg`) or -1 (`cmpl`).
    pub fn cmp(&mut self, nan_is_greater: bool) -> Result<&mut Self, Error> {
        let operation = "cmp";
        let mode = if nan_is_greater {
            CompareMode::G
        } else {
            CompareMode::L
        };
        self.tracked(operation, |frame| {
            let found = frame.top_operands(operation, 2)?;
            let instruction = match found[1] {
                ValueType::Long if found[0] == ValueType::Long => Instruction::LCmp,
                ValueType::Long => return Err(mismatch(operation, "[long, long]", found)),
                ValueType::Float if found[0] == ValueType::Float => Instruction::FCmp(mode),
                ValueType::Float => return Err(mismatch(operation, "[float, float]", found)),
                ValueType::Double if found[0] == ValueType::Double => Instruction::DCmp(mode),
                ValueType::Double => return Err(mismatch(operation, "[double, double]", found)),
                _ => return Err(mismatch(operation, "two long, float or double", found)),
            };
            frame.pop_operands(2);
            frame.stack.push(ValueType::INT);
            Ok(vec![instruction].into())
        })
    }

    /// Convert the top value to another primitive type
    ///
    /// Conversions to `byte`, `char`, and `short` from `long`, `float`, or `double` go through
    /// `int`. Converting a value to its own type emits nothing.
    pub fn convert(&mut self, to: BaseType) -> Result<&mut Self, Error> {
        let operation = "convert";
        self.tracked(operation, |frame| {
            let found = frame.top_operands(operation, 1)?;
            let category = match NumericCategory::of(&found[0], false) {
                Some(category) if to != BaseType::Boolean => category,
                _ => {
                    let expected = format!("numeric value convertible to {}", to.keyword());
                    return Err(mismatch(operation, expected, found));
                }
            };

            let mut code = vec![];
            match (category, to) {
                (NumericCategory::Int, BaseType::Long) => code.push(Instruction::I2L),
                (NumericCategory::Int, BaseType::Float) => code.push(Instruction::I2F),
                (NumericCategory::Int, BaseType::Double) => code.push(Instruction::I2D),
                (NumericCategory::Long, BaseType::Float) => code.push(Instruction::L2F),
                (NumericCategory::Long, BaseType::Double) => code.push(Instruction::L2D),
                (NumericCategory::Float, BaseType::Long) => code.push(Instruction::F2L),
                (NumericCategory::Float, BaseType::Double) => code.push(Instruction::F2D),
                (NumericCategory::Double, BaseType::Long) => code.push(Instruction::D2L),
                (NumericCategory::Double, BaseType::Float) => code.push(Instruction::D2F),
                (NumericCategory::Long, BaseType::Long)
                | (NumericCategory::Float, BaseType::Float)
                | (NumericCategory::Double, BaseType::Double) => (),

                // What's left are conversions to `int`-like types
                (category, int_like) => {
                    match category {
                        NumericCategory::Int => (),
                        NumericCategory::Long => code.push(Instruction::L2I),
                        NumericCategory::Float => code.push(Instruction::F2I),
                        NumericCategory::Double => code.push(Instruction::D2I),
                    }
                    match int_like {
                        BaseType::Byte => code.push(Instruction::I2B),
                        BaseType::Char => code.push(Instruction::I2C),
                        BaseType::Short => code.push(Instruction::I2S),
                        _ => (),
                    }
                }
            }

            frame.pop_operands(1);
            frame.stack.push(ValueType::from(to));
            Ok(code.into())
        })
    }
}

/// Fields and arrays
impl<'g> CodeBuilder<'g> {
    /// Push the value of a field (instance fields pop their object first)
    pub fn get_field(&mut self, field: FieldId<'g>) -> Result<&mut Self, Error> {
        let operation = "get_field";
        self.tracked(operation, |frame| {
            let instruction = if field.is_static() {
                Instruction::GetStatic(field)
            } else {
                let object = ValueType::object(field.class);
                frame.check_operands(operation, &[Requirement::AssignableTo(object)])?;
                frame.pop_operands(1);
                Instruction::GetField(field)
            };
            frame.stack.push(ValueType::from(field.descriptor));
            Ok(vec![instruction].into())
        })
    }

    /// Pop a value into a field (instance fields need their object beneath the value)
    pub fn put_field(&mut self, field: FieldId<'g>) -> Result<&mut Self, Error> {
        let operation = "put_field";
        self.tracked(operation, |frame| {
            let value = Requirement::AssignableTo(ValueType::from(field.descriptor));
            let instruction = if field.is_static() {
                frame.check_operands(operation, &[value])?;
                frame.pop_operands(1);
                Instruction::PutStatic(field)
            } else {
                let object = Requirement::AssignableTo(ValueType::object(field.class));
                frame.check_operands(operation, &[object, value])?;
                frame.pop_operands(2);
                Instruction::PutField(field)
            };
            Ok(vec![instruction].into())
        })
    }

    fn own_field(&self, name: &str) -> Result<FieldId<'g>, Error> {
        let class = self.method.class;
        class
            .0
            .find_field(name)
            .ok_or_else(|| Error::MissingMember(format!("{}.{}", class.name, name)))
    }

    /// `get_field` for a field (looked up by name) of the routine's own class
    pub fn get_own_field(&mut self, name: &str) -> Result<&mut Self, Error> {
        let field = self.own_field(name)?;
        self.get_field(field)
    }

    /// `put_field` for a field (looked up by name) of the routine's own class
    pub fn put_own_field(&mut self, name: &str) -> Result<&mut Self, Error> {
        let field = self.own_field(name)?;
        self.put_field(field)
    }

    /// Pop a length and push a new array of that length
    pub fn new_array(&mut self, component: FieldType<ClassId<'g>>) -> Result<&mut Self, Error> {
        let operation = "new_array";
        self.tracked(operation, |frame| {
            frame.check_operands(operation, &[Requirement::IntNumeric])?;
            frame.pop_operands(1);
            frame.stack.push(ValueType::Reference(RefType::array(component)));
            let instruction = match component {
                FieldType::Base(base) => Instruction::NewArray(base),
                FieldType::Ref(ref_type) => Instruction::ANewArray(ref_type),
            };
            Ok(vec![instruction].into())
        })
    }

    /// Pop an array and an index, push the element at that index
    pub fn array_load(&mut self) -> Result<&mut Self, Error> {
        let operation = "array_load";
        self.tracked(operation, |frame| {
            frame.check_operands(operation, &[Requirement::Array, Requirement::IntLike])?;
            let found = frame.top_operands(operation, 2)?;
            let component = match array_component(&found[0]) {
                Some(component) => component,
                None => return Err(mismatch(operation, "[array, int-like]", found)),
            };
            let instruction = match component {
                FieldType::Base(BaseType::Boolean) | FieldType::Base(BaseType::Byte) => {
                    Instruction::BALoad
                }
                FieldType::Base(BaseType::Char) => Instruction::CALoad,
                FieldType::Base(BaseType::Short) => Instruction::SALoad,
                FieldType::Base(BaseType::Int) => Instruction::IALoad,
                FieldType::Base(BaseType::Long) => Instruction::LALoad,
                FieldType::Base(BaseType::Float) => Instruction::FALoad,
                FieldType::Base(BaseType::Double) => Instruction::DALoad,
                FieldType::Ref(_) => Instruction::AALoad,
            };
            frame.pop_operands(2);
            frame.stack.push(ValueType::from(component));
            Ok(vec![instruction].into())
        })
    }

    /// Pop an array, an index, and a value, and store the value at that index
    pub fn array_store(&mut self) -> Result<&mut Self, Error> {
        let operation = "array_store";
        self.tracked(operation, |frame| {
            let found = frame.top_operands(operation, 3)?;
            let component = match array_component(&found[0]) {
                Some(component) => component,
                None => return Err(mismatch(operation, "[array, int-like, component]", found)),
            };
            let requirements = [
                Requirement::Array,
                Requirement::IntLike,
                Requirement::AssignableTo(ValueType::from(component)),
            ];
            frame.check_operands(operation, &requirements)?;
            let instruction = match component {
                FieldType::Base(BaseType::Boolean) | FieldType::Base(BaseType::Byte) => {
                    Instruction::BAStore
                }
                FieldType::Base(BaseType::Char) => Instruction::CAStore,
                FieldType::Base(BaseType::Short) => Instruction::SAStore,
                FieldType::Base(BaseType::Int) => Instruction::IAStore,
                FieldType::Base(BaseType::Long) => Instruction::LAStore,
                FieldType::Base(BaseType::Float) => Instruction::FAStore,
                FieldType::Base(BaseType::Double) => Instruction::DAStore,
                FieldType::Ref(_) => Instruction::AAStore,
            };
            frame.pop_operands(3);
            Ok(vec![instruction].into())
        })
    }

    /// Pop an array and push its length
    pub fn array_length(&mut self) -> Result<&mut Self, Error> {
        let operation = "array_length";
        self.tracked(operation, |frame| {
            frame.check_operands(operation, &[Requirement::Array])?;
            frame.pop_operands(1);
            frame.stack.push(ValueType::INT);
            Ok(vec![Instruction::ArrayLength].into())
        })
    }
}

fn array_component<'g>(value: &ValueType<'g>) -> Option<FieldType<ClassId<'g>>> {
    match value {
        ValueType::Reference(ref_type) => ref_type.component(),
        _ => None,
    }
}

/// Objects, casts, and boxing
impl<'g> CodeBuilder<'g> {
    /// Push a new (not yet constructed) object
    pub fn new_object(&mut self, class: ClassId<'g>) -> Result<&mut Self, Error> {
        self.tracked("new_object", |frame| {
            frame.stack.push(ValueType::object(class));
            Ok(vec![Instruction::New(class)].into())
        })
    }

    /// Cast the top reference to another type
    ///
    /// Unless `unchecked` is set, the value must already be assignable to `target`.
    pub fn cast(
        &mut self,
        target: RefType<ClassId<'g>>,
        unchecked: bool,
    ) -> Result<&mut Self, Error> {
        let operation = "cast";
        self.tracked(operation, |frame| {
            let requirement = if unchecked {
                Requirement::AnyReference
            } else {
                Requirement::AssignableTo(ValueType::Reference(target))
            };
            frame.check_operands(operation, &[requirement])?;
            frame.pop_operands(1);
            frame.stack.push(ValueType::Reference(target));
            Ok(vec![Instruction::CheckCast(target)].into())
        })
    }

    /// Pop a reference and push whether it is an instance of a type
    pub fn instance_of(&mut self, target: RefType<ClassId<'g>>) -> Result<&mut Self, Error> {
        let operation = "instance_of";
        self.tracked(operation, |frame| {
            frame.check_operands(operation, &[Requirement::AnyReference])?;
            frame.pop_operands(1);
            frame.stack.push(ValueType::INT);
            Ok(vec![Instruction::InstanceOf(target)].into())
        })
    }

    /// Box the top primitive value with the `valueOf` of its box class
    pub fn box_value(&mut self) -> Result<&mut Self, Error> {
        let operation = "box_value";
        let java = self.java;
        self.tracked(operation, |frame| {
            let found = frame.top_operands(operation, 1)?;
            let primitive = match found[0].base_type() {
                Some(primitive) => primitive,
                None => return Err(mismatch(operation, "primitive", found)),
            };
            let boxing = java.members.boxing(primitive);
            frame.pop_operands(1);
            frame.stack.push(ValueType::object(boxing.class));
            Ok(vec![Instruction::Invoke(InvokeType::Static, boxing.value_of)].into())
        })
    }

    /// Unbox the top value with the `xxxValue` method of its box class
    pub fn unbox_value(&mut self) -> Result<&mut Self, Error> {
        let operation = "unbox_value";
        let java = self.java;
        self.tracked(operation, |frame| {
            let found = frame.top_operands(operation, 1)?;
            let boxing = match found[0] {
                ValueType::Reference(RefType::Object(class)) => java.members.unboxing(class),
                _ => None,
            };
            let boxing = match boxing {
                Some(boxing) => boxing,
                None => return Err(mismatch(operation, "box of a primitive", found)),
            };
            frame.pop_operands(1);
            frame.stack.push(ValueType::from(boxing.primitive));
            Ok(vec![Instruction::Invoke(InvokeType::Virtual, boxing.unbox)].into())
        })
    }
}

/// Invocation and lambdas
impl<'g> CodeBuilder<'g> {
    /// Invoke a method, picking the invocation instruction from the method itself
    pub fn invoke(&mut self, method: MethodId<'g>) -> Result<&mut Self, Error> {
        let invoke_type = method.infer_invoke_type()?;
        self.invoke_checked("invoke", method, method.class, invoke_type)
    }

    /// Invoke a specific implementation of a method with `invokespecial` (for super calls and
    /// default methods)
    ///
    /// The receiver is checked against `target` instead of the declaring class.
    pub fn invoke_on(
        &mut self,
        method: MethodId<'g>,
        target: ClassId<'g>,
    ) -> Result<&mut Self, Error> {
        let invoke_type = if method.is_static() {
            InvokeType::Static
        } else {
            InvokeType::Special
        };
        self.invoke_checked("invoke_on", method, target, invoke_type)
    }

    fn invoke_checked(
        &mut self,
        operation: &'static str,
        method: MethodId<'g>,
        receiver: ClassId<'g>,
        invoke_type: InvokeType,
    ) -> Result<&mut Self, Error> {
        self.tracked(operation, |frame| {
            let mut requirements = vec![];
            if !method.is_static() {
                requirements.push(Requirement::AssignableTo(ValueType::object(receiver)));
            }
            for parameter in &method.descriptor.parameters {
                requirements.push(Requirement::AssignableTo(ValueType::from(*parameter)));
            }
            frame.check_operands(operation, &requirements)?;
            frame.pop_operands(requirements.len());
            if let Some(return_type) = method.descriptor.return_type {
                frame.stack.push(ValueType::from(return_type));
            }
            Ok(vec![Instruction::Invoke(invoke_type, method)].into())
        })
    }

    /// Turn a method into an instance of a functional interface
    ///
    /// The number of captured values is the number of parameters of `method` (plus one for the
    /// receiver of an instance method) minus the number of parameters of the interface's
    /// functional method. When the parameter counts match, an instance method captures just its
    /// receiver. Otherwise, captures are checked against the leading parameters of the functional
    /// method.
    pub fn lambda(
        &mut self,
        method: MethodId<'g>,
        interface: ClassId<'g>,
    ) -> Result<&mut Self, Error> {
        let operation = "lambda";
        let functional = functional_method(interface)?;
        let source_arity = method.descriptor.parameters.len();
        let target_arity = functional.descriptor.parameters.len();
        let receiver = usize::from(!method.is_static());

        let closures = match (source_arity + receiver).checked_sub(target_arity) {
            Some(closures) => closures,
            None => {
                return Err(Error::TypeMismatch {
                    operation,
                    expected: format!("method with at least {} parameters", target_arity),
                    found: format!("{:?}", method.0),
                })
            }
        };

        let requirements: Vec<Requirement<'g>> = if source_arity == target_arity {
            if method.is_static() {
                vec![]
            } else {
                vec![Requirement::AssignableTo(ValueType::object(method.class))]
            }
        } else {
            // Captures are popped top first, and the n-th one popped lines up with the n-th
            // parameter of the functional method
            (0..closures)
                .rev()
                .map(|popped| {
                    functional.descriptor.parameters.get(popped).map_or(
                        Requirement::Any,
                        |parameter| Requirement::AssignableTo(ValueType::from(*parameter)),
                    )
                })
                .collect()
        };

        let handle = ConstantData::MethodHandle(method_handle_kind(method), method);
        self.bind_lambda(operation, &requirements, functional, interface, handle)
    }

    /// Turn a field into an instance of a functional interface
    ///
    /// A functional method with no parameters reads the field and one with a single parameter
    /// writes it. Instance fields capture their object.
    pub fn lambda_field(
        &mut self,
        field: FieldId<'g>,
        interface: ClassId<'g>,
    ) -> Result<&mut Self, Error> {
        let operation = "lambda_field";
        let functional = functional_method(interface)?;
        let setter = match functional.descriptor.parameters.len() {
            0 => false,
            1 => true,
            n => {
                return Err(Error::TypeMismatch {
                    operation,
                    expected: String::from("functional method with at most one parameter"),
                    found: format!("{:?} with {} parameters", functional.0, n),
                })
            }
        };

        let kind = match (field.is_static(), setter) {
            (true, false) => HandleKind::GetStatic,
            (true, true) => HandleKind::PutStatic,
            (false, false) => HandleKind::GetField,
            (false, true) => HandleKind::PutField,
        };
        let requirements: Vec<Requirement<'g>> = if field.is_static() {
            vec![]
        } else {
            vec![Requirement::AssignableTo(ValueType::object(field.class))]
        };

        let handle = ConstantData::FieldHandle(kind, field);
        self.bind_lambda(operation, &requirements, functional, interface, handle)
    }

    /// Pop captured values and push a functional interface instance made by `invokedynamic`
    fn bind_lambda(
        &mut self,
        operation: &'static str,
        requirements: &[Requirement<'g>],
        functional: MethodId<'g>,
        interface: ClassId<'g>,
        handle: ConstantData<'g>,
    ) -> Result<&mut Self, Error> {
        let metafactory = self.java.members.invoke.metafactory;
        self.tracked(operation, |frame| {
            frame.check_operands(operation, requirements)?;
            let captured: Vec<FieldType<ClassId<'g>>> = frame
                .top_operands(operation, requirements.len())?
                .iter()
                .filter_map(ValueType::field_type)
                .collect();
            frame.pop_operands(requirements.len());
            frame.stack.push(ValueType::object(interface));

            let call_site = InvokeDynamicData {
                name: functional.name.clone(),
                descriptor: MethodDescriptor {
                    parameters: captured,
                    return_type: Some(FieldType::object(interface)),
                },
                bootstrap: metafactory,
                arguments: vec![
                    ConstantData::MethodType(functional.descriptor.clone()),
                    handle,
                    ConstantData::MethodType(functional.descriptor.clone()),
                ],
            };
            Ok(vec![Instruction::InvokeDynamic(call_site)].into())
        })
    }
}

fn functional_method<'g>(interface: ClassId<'g>) -> Result<MethodId<'g>, Error> {
    interface.0.functional_method().ok_or_else(|| {
        Error::MissingMember(format!(
            "{} is not an interface with a single abstract method",
            interface.name
        ))
    })
}

fn method_handle_kind(method: MethodId<'_>) -> HandleKind {
    if method.is_static() {
        HandleKind::InvokeStatic
    } else if method.is_constructor() {
        HandleKind::NewInvokeSpecial
    } else if method.class.is_interface() {
        HandleKind::InvokeInterface
    } else if !method.is_overridable() {
        HandleKind::InvokeSpecial
    } else {
        HandleKind::InvokeVirtual
    }
}

/// Constants
impl<'g> CodeBuilder<'g> {
    fn constant(
        &mut self,
        operation: &'static str,
        value_type: ValueType<'g>,
        code: RawCode<'g>,
    ) -> Result<&mut Self, Error> {
        self.tracked(operation, |frame: &mut Frame<'g>| {
            frame.stack.push(value_type);
            Ok(code)
        })
    }

    pub fn const_int(&mut self, integer: i32) -> Result<&mut Self, Error> {
        self.constant("const_int", ValueType::INT, vec![int_constant(integer)].into())
    }

    pub fn const_bool(&mut self, boolean: bool) -> Result<&mut Self, Error> {
        let code = vec![int_constant(i32::from(boolean))];
        self.constant("const_bool", ValueType::BOOLEAN, code.into())
    }

    pub fn const_char(&mut self, character: u16) -> Result<&mut Self, Error> {
        let code = vec![int_constant(i32::from(character))];
        self.constant("const_char", ValueType::Int(IntKind::Char), code.into())
    }

    pub fn const_byte(&mut self, byte: i8) -> Result<&mut Self, Error> {
        let code = vec![int_constant(i32::from(byte))];
        self.constant("const_byte", ValueType::Int(IntKind::Byte), code.into())
    }

    pub fn const_short(&mut self, short: i16) -> Result<&mut Self, Error> {
        let code = vec![int_constant(i32::from(short))];
        self.constant("const_short", ValueType::Int(IntKind::Short), code.into())
    }

    /// Push a long constant onto the stack
    ///
    /// Small values are pushed as `int`s and then converted, which keeps them out of the constant
    /// pool and makes the bytecode shorter: `iconst_2 i2l` is 2 bytes and no constant, whereas
    /// `ldc2_w 2` is 3 bytes and a two-slot constant.
    pub fn const_long(&mut self, long: i64) -> Result<&mut Self, Error> {
        let code = match long {
            0 => vec![Instruction::LConst0],
            1 => vec![Instruction::LConst1],
            -32768..=32767 => vec![int_constant(long as i32), Instruction::I2L],
            _ => vec![Instruction::Ldc2(ConstantData::Long(long))],
        };
        self.constant("const_long", ValueType::Long, code.into())
    }

    pub fn const_float(&mut self, float: f32) -> Result<&mut Self, Error> {
        let code = match float {
            f if f == 0.0 && f.is_sign_positive() => vec![Instruction::FConst0],
            f if f == 1.0 => vec![Instruction::FConst1],
            f if f == 2.0 => vec![Instruction::FConst2],
            f if f == -1.0 || f == 3.0 || f == 4.0 || f == 5.0 => {
                vec![int_constant(f as i32), Instruction::I2F]
            }
            _ => vec![Instruction::Ldc(ConstantData::Float(float))],
        };
        self.constant("const_float", ValueType::Float, code.into())
    }

    pub fn const_double(&mut self, double: f64) -> Result<&mut Self, Error> {
        let code = match double {
            f if f == 0.0 && f.is_sign_positive() => vec![Instruction::DConst0],
            f if f == 1.0 => vec![Instruction::DConst1],
            f if f == -1.0 || f == 2.0 || f == 3.0 || f == 4.0 || f == 5.0 => {
                vec![int_constant(f as i32), Instruction::I2D]
            }
            _ => vec![Instruction::Ldc2(ConstantData::Double(double))],
        };
        self.constant("const_double", ValueType::Double, code.into())
    }

    pub fn const_string(&mut self, string: &str) -> Result<&mut Self, Error> {
        let string_type = ValueType::object(self.java.classes.lang.string);
        let code = vec![Instruction::Ldc(ConstantData::String(string.to_owned()))];
        self.constant("const_string", string_type, code.into())
    }

    /// Push a `null` that is tracked as having a specific reference type
    pub fn const_null(&mut self, ref_type: RefType<ClassId<'g>>) -> Result<&mut Self, Error> {
        let code = vec![Instruction::AConstNull];
        self.constant("const_null", ValueType::Reference(ref_type), code.into())
    }

    /// Push the zero value of a type (`0`, `0.0`, `false`, or `null`)
    pub fn default_value(&mut self, field_type: FieldType<ClassId<'g>>) -> Result<&mut Self, Error> {
        let instruction = match field_type {
            FieldType::Base(BaseType::Long) => Instruction::LConst0,
            FieldType::Base(BaseType::Float) => Instruction::FConst0,
            FieldType::Base(BaseType::Double) => Instruction::DConst0,
            FieldType::Base(_) => Instruction::IConst0,
            FieldType::Ref(_) => Instruction::AConstNull,
        };
        let value_type = ValueType::from(field_type);
        self.constant("default_value", value_type, vec![instruction].into())
    }
}

/// Shortest instruction pushing an `int`
fn int_constant<'g>(integer: i32) -> Instruction<'g> {
    match integer {
        -1 => Instruction::IConstM1,
        0 => Instruction::IConst0,
        1 => Instruction::IConst1,
        2 => Instruction::IConst2,
        3 => Instruction::IConst3,
        4 => Instruction::IConst4,
        5 => Instruction::IConst5,
        -128..=127 => Instruction::BiPush(integer as i8),
        -32768..=32767 => Instruction::SiPush(integer as i16),
        _ => Instruction::Ldc(ConstantData::Integer(integer)),
    }
}

/// Leaving the routine
impl<'g> CodeBuilder<'g> {
    /// Pop a throwable and throw it
    pub fn throw_value(&mut self) -> Result<&mut Self, Error> {
        let operation = "throw_value";
        let throwable = ValueType::object(self.java.classes.lang.throwable);
        self.tracked(operation, |frame| {
            frame.check_operands(operation, &[Requirement::AssignableTo(throwable)])?;
            frame.pop_operands(1);
            Ok(vec![Instruction::AThrow].into())
        })
    }

    /// Return from the routine, popping the return value if there is one
    pub fn return_value(&mut self) -> Result<&mut Self, Error> {
        let operation = "return_value";
        let return_type = self.method.descriptor.return_type;
        self.tracked(operation, |frame| {
            let return_type = match return_type {
                None => return Ok(vec![Instruction::Return].into()),
                Some(return_type) => ValueType::from(return_type),
            };
            frame.check_operands(operation, &[Requirement::AssignableTo(return_type)])?;
            frame.pop_operands(1);
            let instruction = match return_type {
                ValueType::Int(_) => Instruction::IReturn,
                ValueType::Long => Instruction::LReturn,
                ValueType::Float => Instruction::FReturn,
                ValueType::Double => Instruction::DReturn,
                ValueType::Reference(_) | ValueType::Top => Instruction::AReturn,
            };
            Ok(vec![instruction].into())
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn int_constant_forms() {
        assert_eq!(int_constant(-1), Instruction::IConstM1);
        assert_eq!(int_constant(5), Instruction::IConst5);
        assert_eq!(int_constant(6), Instruction::BiPush(6));
        assert_eq!(int_constant(-128), Instruction::BiPush(-128));
        assert_eq!(int_constant(128), Instruction::SiPush(128));
        assert_eq!(int_constant(-32768), Instruction::SiPush(-32768));
        assert_eq!(
            int_constant(32768),
            Instruction::Ldc(ConstantData::Integer(32768))
        );
    }

    #[test]
    fn numeric_categories() {
        assert_eq!(
            NumericCategory::of(&ValueType::BOOLEAN, true),
            Some(NumericCategory::Int)
        );
        assert_eq!(NumericCategory::of(&ValueType::BOOLEAN, false), None);
        assert_eq!(
            NumericCategory::of(&ValueType::Int(IntKind::Char), false),
            Some(NumericCategory::Int)
        );
        assert_eq!(NumericCategory::of(&ValueType::Top, true), None);
    }
}
