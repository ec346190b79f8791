use super::{ClassData, ClassGraph, ClassId, MethodData, MethodId};
use crate::jvm::{
    BaseType, BinaryName, ClassAccessFlags, FieldType, MethodAccessFlags, MethodDescriptor,
    UnqualifiedName,
};
use elsa::FrozenVec;

/// The slice of the JDK that assembled code leans on
pub struct JavaLibrary<'g> {
    pub classes: JavaClasses<'g>,
    pub members: JavaMembers<'g>,
}

impl<'g> JavaLibrary<'g> {
    pub fn add_to_graph(class_graph: &'g ClassGraph<'g>) -> JavaLibrary<'g> {
        let classes = JavaClasses::add_to_graph(class_graph);
        let members = JavaMembers::add_to_graph(class_graph, &classes);
        JavaLibrary { classes, members }
    }
}

/// Classes inside `java.*`
pub struct JavaClasses<'g> {
    pub lang: LangClasses<'g>,
    pub io: IoClasses<'g>,
    pub invoke: InvokeClasses<'g>,
    pub function: FunctionClasses<'g>,
}

/// Classes inside `java.lang.*`
pub struct LangClasses<'g> {
    pub object: ClassId<'g>,
    pub cloneable: ClassId<'g>,
    pub char_sequence: ClassId<'g>,
    pub string: ClassId<'g>,
    pub number: ClassId<'g>,
    pub boolean: ClassId<'g>,
    pub byte: ClassId<'g>,
    pub character: ClassId<'g>,
    pub short: ClassId<'g>,
    pub integer: ClassId<'g>,
    pub long: ClassId<'g>,
    pub float: ClassId<'g>,
    pub double: ClassId<'g>,
    pub throwable: ClassId<'g>,
    pub error: ClassId<'g>,
    pub exception: ClassId<'g>,
    pub runtime_exception: ClassId<'g>,
    pub runnable: ClassId<'g>,
}

/// Classes inside `java.io.*`
pub struct IoClasses<'g> {
    pub serializable: ClassId<'g>,
}

/// Classes inside `java.lang.invoke.*`
pub struct InvokeClasses<'g> {
    pub call_site: ClassId<'g>,
    pub lambda_metafactory: ClassId<'g>,
    pub method_handle: ClassId<'g>,
    pub method_handles_lookup: ClassId<'g>,
    pub method_type: ClassId<'g>,
}

/// Classes inside `java.util.function.*`
pub struct FunctionClasses<'g> {
    pub consumer: ClassId<'g>,
    pub function: ClassId<'g>,
    pub int_unary_operator: ClassId<'g>,
    pub supplier: ClassId<'g>,
}

const CLASS: ClassAccessFlags = ClassAccessFlags::from_bits_truncate(
    ClassAccessFlags::PUBLIC.bits() | ClassAccessFlags::SUPER.bits(),
);
const FINAL_CLASS: ClassAccessFlags =
    ClassAccessFlags::from_bits_truncate(CLASS.bits() | ClassAccessFlags::FINAL.bits());
const INTERFACE: ClassAccessFlags = ClassAccessFlags::from_bits_truncate(
    ClassAccessFlags::PUBLIC.bits()
        | ClassAccessFlags::INTERFACE.bits()
        | ClassAccessFlags::ABSTRACT.bits(),
);

impl<'g> JavaClasses<'g> {
    pub fn add_to_graph(class_graph: &'g ClassGraph<'g>) -> JavaClasses<'g> {
        let object = class_graph.add_class(ClassData {
            name: BinaryName::OBJECT,
            superclass: None,
            interfaces: FrozenVec::new(),
            access_flags: CLASS,
            methods: FrozenVec::new(),
            fields: FrozenVec::new(),
        });
        let add = |name: BinaryName, superclass: ClassId<'g>, flags: ClassAccessFlags| {
            class_graph.add_class(ClassData::new(name, superclass, flags))
        };

        let serializable = add(BinaryName::SERIALIZABLE, object, INTERFACE);
        let cloneable = add(BinaryName::CLONEABLE, object, INTERFACE);
        let char_sequence = add(BinaryName::CHARSEQUENCE, object, INTERFACE);
        let runnable = add(BinaryName::RUNNABLE, object, INTERFACE);

        let string = add(BinaryName::STRING, object, FINAL_CLASS);
        string.interfaces.push(char_sequence.0);
        string.interfaces.push(serializable.0);

        let number = add(BinaryName::NUMBER, object, CLASS | ClassAccessFlags::ABSTRACT);
        number.interfaces.push(serializable.0);
        let boolean = add(BinaryName::BOOLEAN, object, FINAL_CLASS);
        let character = add(BinaryName::CHARACTER, object, FINAL_CLASS);
        let byte = add(BinaryName::BYTE, number, FINAL_CLASS);
        let short = add(BinaryName::SHORT, number, FINAL_CLASS);
        let integer = add(BinaryName::INTEGER, number, FINAL_CLASS);
        let long = add(BinaryName::LONG, number, FINAL_CLASS);
        let float = add(BinaryName::FLOAT, number, FINAL_CLASS);
        let double = add(BinaryName::DOUBLE, number, FINAL_CLASS);
        for boxed in [boolean, character] {
            boxed.interfaces.push(serializable.0);
        }

        let throwable = add(BinaryName::THROWABLE, object, CLASS);
        throwable.interfaces.push(serializable.0);
        let error = add(BinaryName::ERROR, throwable, CLASS);
        let exception = add(BinaryName::EXCEPTION, throwable, CLASS);
        let runtime_exception = add(BinaryName::RUNTIMEEXCEPTION, exception, CLASS);

        let invoke = InvokeClasses {
            call_site: add(BinaryName::CALLSITE, object, CLASS | ClassAccessFlags::ABSTRACT),
            lambda_metafactory: add(BinaryName::LAMBDAMETAFACTORY, object, FINAL_CLASS),
            method_handle: add(BinaryName::METHODHANDLE, object, CLASS | ClassAccessFlags::ABSTRACT),
            method_handles_lookup: add(BinaryName::METHODHANDLES_LOOKUP, object, FINAL_CLASS),
            method_type: add(BinaryName::METHODTYPE, object, FINAL_CLASS),
        };

        let function = FunctionClasses {
            consumer: add(BinaryName::CONSUMER, object, INTERFACE),
            function: add(BinaryName::FUNCTION, object, INTERFACE),
            int_unary_operator: add(BinaryName::INTUNARYOPERATOR, object, INTERFACE),
            supplier: add(BinaryName::SUPPLIER, object, INTERFACE),
        };

        JavaClasses {
            lang: LangClasses {
                object,
                cloneable,
                char_sequence,
                string,
                number,
                boolean,
                byte,
                character,
                short,
                integer,
                long,
                float,
                double,
                throwable,
                error,
                exception,
                runtime_exception,
                runnable,
            },
            io: IoClasses { serializable },
            invoke,
            function,
        }
    }
}

/// Members of classes inside `java.*`
pub struct JavaMembers<'g> {
    pub lang: LangMembers<'g>,
    pub invoke: InvokeMembers<'g>,
    pub function: FunctionMembers<'g>,
}

/// Members of classes inside `java.lang.*`
pub struct LangMembers<'g> {
    pub object_init: MethodId<'g>,
    pub runnable_run: MethodId<'g>,

    /// One entry per primitive type, in `BaseType::ALL` order
    pub boxes: Vec<BoxingMembers<'g>>,
}

/// Conversions between a primitive type and its box class
pub struct BoxingMembers<'g> {
    pub primitive: BaseType,
    pub class: ClassId<'g>,

    /// eg. `Integer.valueOf(int)`
    pub value_of: MethodId<'g>,

    /// eg. `Integer.intValue()`
    pub unbox: MethodId<'g>,
}

/// Members of classes inside `java.lang.invoke.*`
pub struct InvokeMembers<'g> {
    pub metafactory: MethodId<'g>,
}

/// Abstract methods of the interfaces inside `java.util.function.*`
pub struct FunctionMembers<'g> {
    pub consumer_accept: MethodId<'g>,
    pub function_apply: MethodId<'g>,
    pub int_unary_operator_apply_as_int: MethodId<'g>,
    pub supplier_get: MethodId<'g>,
}

impl<'g> JavaMembers<'g> {
    pub fn add_to_graph(class_graph: &ClassGraph<'g>, classes: &JavaClasses<'g>) -> JavaMembers<'g> {
        let lang = &classes.lang;
        let object = FieldType::object(lang.object);

        let abstract_method = |class, name, parameters, return_type| {
            class_graph.add_method(MethodData {
                class,
                name,
                descriptor: MethodDescriptor {
                    parameters,
                    return_type,
                },
                access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
            })
        };

        let object_init = class_graph.add_method(MethodData {
            class: lang.object,
            name: UnqualifiedName::INIT,
            descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: None,
            },
            access_flags: MethodAccessFlags::PUBLIC,
        });
        let runnable_run = abstract_method(lang.runnable, UnqualifiedName::RUN, vec![], None);

        let boxes = BaseType::ALL
            .into_iter()
            .map(|primitive| BoxingMembers::add_to_graph(class_graph, lang, primitive))
            .collect();

        let invoke = &classes.invoke;
        let metafactory = class_graph.add_method(MethodData {
            class: invoke.lambda_metafactory,
            name: UnqualifiedName::METAFACTORY,
            descriptor: MethodDescriptor {
                parameters: vec![
                    FieldType::object(invoke.method_handles_lookup),
                    FieldType::object(lang.string),
                    FieldType::object(invoke.method_type),
                    FieldType::object(invoke.method_type),
                    FieldType::object(invoke.method_handle),
                    FieldType::object(invoke.method_type),
                ],
                return_type: Some(FieldType::object(invoke.call_site)),
            },
            access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        });

        let function = &classes.function;
        let function = FunctionMembers {
            consumer_accept: abstract_method(
                function.consumer,
                UnqualifiedName::ACCEPT,
                vec![object],
                None,
            ),
            function_apply: abstract_method(
                function.function,
                UnqualifiedName::APPLY,
                vec![object],
                Some(object),
            ),
            int_unary_operator_apply_as_int: abstract_method(
                function.int_unary_operator,
                UnqualifiedName::APPLYASINT,
                vec![FieldType::int()],
                Some(FieldType::int()),
            ),
            supplier_get: abstract_method(
                function.supplier,
                UnqualifiedName::GET,
                vec![],
                Some(object),
            ),
        };

        JavaMembers {
            lang: LangMembers {
                object_init,
                runnable_run,
                boxes,
            },
            invoke: InvokeMembers { metafactory },
            function,
        }
    }

    /// Box class and conversion methods of a primitive type
    pub fn boxing(&self, primitive: BaseType) -> &BoxingMembers<'g> {
        let index = BaseType::ALL
            .iter()
            .position(|base| *base == primitive)
            .unwrap_or_default();
        &self.lang.boxes[index]
    }

    /// Primitive type and conversion methods of a box class
    pub fn unboxing(&self, class: ClassId<'g>) -> Option<&BoxingMembers<'g>> {
        self.lang.boxes.iter().find(|boxed| boxed.class == class)
    }
}

impl<'g> BoxingMembers<'g> {
    fn add_to_graph(
        class_graph: &ClassGraph<'g>,
        lang: &LangClasses<'g>,
        primitive: BaseType,
    ) -> BoxingMembers<'g> {
        let (class, unbox_name) = match primitive {
            BaseType::Boolean => (lang.boolean, UnqualifiedName::BOOLEANVALUE),
            BaseType::Byte => (lang.byte, UnqualifiedName::BYTEVALUE),
            BaseType::Char => (lang.character, UnqualifiedName::CHARVALUE),
            BaseType::Short => (lang.short, UnqualifiedName::SHORTVALUE),
            BaseType::Int => (lang.integer, UnqualifiedName::INTVALUE),
            BaseType::Long => (lang.long, UnqualifiedName::LONGVALUE),
            BaseType::Float => (lang.float, UnqualifiedName::FLOATVALUE),
            BaseType::Double => (lang.double, UnqualifiedName::DOUBLEVALUE),
        };
        let value_of = class_graph.add_method(MethodData {
            class,
            name: UnqualifiedName::VALUEOF,
            descriptor: MethodDescriptor {
                parameters: vec![FieldType::Base(primitive)],
                return_type: Some(FieldType::object(class)),
            },
            access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        });
        let unbox = class_graph.add_method(MethodData {
            class,
            name: unbox_name,
            descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: Some(FieldType::Base(primitive)),
            },
            access_flags: MethodAccessFlags::PUBLIC,
        });
        BoxingMembers {
            primitive,
            class,
            value_of,
            unbox,
        }
    }
}
