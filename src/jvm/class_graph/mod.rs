use super::code::InvokeType;
use super::{
    BinaryName, ClassAccessFlags, Error, FieldAccessFlags, FieldType, MethodAccessFlags,
    MethodDescriptor, Name, RenderDescriptor, UnqualifiedName,
};
use crate::util::RefId;
use elsa::map::FrozenMap;
use elsa::FrozenVec;
use std::fmt;
use typed_arena::Arena;

mod assignable;
mod java_library;

pub use assignable::*;
pub use java_library::*;

pub type ClassId<'g> = RefId<'g, ClassData<'g>>;
pub type MethodId<'g> = RefId<'g, MethodData<'g>>;
pub type FieldId<'g> = RefId<'g, FieldData<'g>>;

pub struct ClassGraphArenas<'g> {
    class_arena: Arena<ClassData<'g>>,
    method_arena: Arena<MethodData<'g>>,
    field_arena: Arena<FieldData<'g>>,
}

impl<'g> ClassGraphArenas<'g> {
    pub fn new() -> Self {
        ClassGraphArenas {
            class_arena: Arena::new(),
            method_arena: Arena::new(),
            field_arena: Arena::new(),
        }
    }
}

impl<'g> Default for ClassGraphArenas<'g> {
    fn default() -> Self {
        Self::new()
    }
}

/// Classes, interfaces, and their members that assembled code can refer to
///
/// The graph only grows: classes and members are allocated in arenas and handed out as `RefId`s,
/// which stay valid (and compare by identity) for as long as the arenas live. This is what lets
/// value types on the simulated operand stack be plain `Copy` data.
pub struct ClassGraph<'g> {
    arenas: &'g ClassGraphArenas<'g>,
    classes: FrozenMap<&'g BinaryName, &'g ClassData<'g>>,
}

impl<'g> ClassGraph<'g> {
    pub fn new(arenas: &'g ClassGraphArenas<'g>) -> Self {
        ClassGraph {
            arenas,
            classes: FrozenMap::new(),
        }
    }

    pub fn lookup_class(&'g self, name: &BinaryName) -> Option<ClassId<'g>> {
        self.classes.get(name).map(RefId)
    }

    /// Add a new class to the class graph
    ///
    /// If a class with the same name is already present, that class is returned instead.
    pub fn add_class(&'g self, data: ClassData<'g>) -> ClassId<'g> {
        if let Some(existing) = self.lookup_class(&data.name) {
            log::warn!("class {} is already in the class graph", data.name);
            return existing;
        }
        let data: &'g ClassData<'g> = self.arenas.class_arena.alloc(data);
        self.classes.insert(&data.name, data);
        RefId(data)
    }

    /// Add a field to the class graph and to its class
    pub fn add_field(&self, field: FieldData<'g>) -> FieldId<'g> {
        let class: &'g ClassData<'g> = field.class.0;
        if let Some(existing) = class.fields.iter().find(|f| f.name == field.name) {
            return RefId(existing);
        }
        let data: &'g FieldData<'g> = self.arenas.field_arena.alloc(field);
        class.fields.push(data);
        RefId(data)
    }

    /// Add a method to the class graph and to its class
    ///
    /// Adding a method that has the same name, descriptor, and staticness as one already on the
    /// class returns the existing method.
    pub fn add_method(&self, method: MethodData<'g>) -> MethodId<'g> {
        let class: &'g ClassData<'g> = method.class.0;
        if let Some(existing) = class.methods.iter().find(|m| {
            m.name == method.name
                && m.descriptor == method.descriptor
                && m.is_static() == method.is_static()
        }) {
            return RefId(existing);
        }
        let data: &'g MethodData<'g> = self.arenas.method_arena.alloc(method);
        class.methods.push(data);
        RefId(data)
    }

    /// Add the standard types the assembler relies on (boxes, throwables, lambda plumbing)
    pub fn insert_java_library_types(&'g self) -> JavaLibrary<'g> {
        JavaLibrary::add_to_graph(self)
    }
}

pub struct ClassData<'g> {
    pub name: BinaryName,

    /// Superclass is only ever missing for `java/lang/Object` itself
    pub superclass: Option<ClassId<'g>>,

    /// Interfaces implemented (or super-interfaces)
    pub interfaces: FrozenVec<&'g ClassData<'g>>,

    pub access_flags: ClassAccessFlags,
    pub methods: FrozenVec<&'g MethodData<'g>>,
    pub fields: FrozenVec<&'g FieldData<'g>>,
}

impl<'g> ClassData<'g> {
    pub fn new(
        name: BinaryName,
        superclass: ClassId<'g>,
        access_flags: ClassAccessFlags,
    ) -> ClassData<'g> {
        ClassData {
            name,
            superclass: Some(superclass),
            interfaces: FrozenVec::new(),
            access_flags,
            methods: FrozenVec::new(),
            fields: FrozenVec::new(),
        }
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    /// Find a field by name, looking through superclasses too
    pub fn find_field(&'g self, name: &str) -> Option<FieldId<'g>> {
        let mut next_class = Some(self);
        while let Some(class) = next_class {
            if let Some(field) = class.fields.iter().find(|f| f.name.as_str() == name) {
                return Some(RefId(field));
            }
            next_class = class.superclass.map(|superclass| superclass.0);
        }
        None
    }

    /// The single abstract method of a functional interface
    ///
    /// Only methods declared directly on the interface are considered.
    pub fn functional_method(&'g self) -> Option<MethodId<'g>> {
        if !self.is_interface() {
            return None;
        }
        let mut abstract_methods = self
            .methods
            .iter()
            .filter(|m| m.access_flags.contains(MethodAccessFlags::ABSTRACT));
        match (abstract_methods.next(), abstract_methods.next()) {
            (Some(method), None) => Some(RefId(method)),
            _ => None,
        }
    }
}

impl<'g> RenderDescriptor for ClassData<'g> {
    fn render_to(&self, write_to: &mut String) {
        self.name.render_to(write_to)
    }
}

impl<'g> fmt::Debug for ClassData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_str())
    }
}

pub struct MethodData<'g> {
    pub class: ClassId<'g>,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<ClassId<'g>>,
    pub access_flags: MethodAccessFlags,
}

impl<'g> MethodData<'g> {
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    pub fn is_constructor(&self) -> bool {
        self.name == UnqualifiedName::INIT
    }

    /// Can a subclass provide a different implementation?
    pub fn is_overridable(&self) -> bool {
        !self.is_static()
            && !self.is_constructor()
            && !self.access_flags.contains(MethodAccessFlags::PRIVATE)
    }

    /// With the exception of `invokespecial` vs. `invokevirtual` for super calls, there is only
    /// one valid way to invoke a method. This function finds it.
    ///
    /// Fails for interface methods whose argument slots (receiver included) don't fit the `u8`
    /// count of `invokeinterface`.
    pub fn infer_invoke_type(&self) -> Result<InvokeType, Error> {
        Ok(if self.is_static() {
            InvokeType::Static
        } else if !self.is_overridable() {
            InvokeType::Special
        } else if self.class.is_interface() {
            let slots = self.descriptor.parameter_length(true);
            let count = u8::try_from(slots).map_err(|_| Error::TooManyArguments {
                method: format!("{:?}", self),
                slots,
            })?;
            InvokeType::Interface(count)
        } else {
            InvokeType::Virtual
        })
    }
}

impl<'g> fmt::Debug for MethodData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}:{}",
            self.class.name,
            self.name,
            self.descriptor.render()
        )
    }
}

pub struct FieldData<'g> {
    pub class: ClassId<'g>,
    pub name: UnqualifiedName,
    pub descriptor: FieldType<ClassId<'g>>,
    pub access_flags: FieldAccessFlags,
}

impl<'g> FieldData<'g> {
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::STATIC)
    }
}

impl<'g> fmt::Debug for FieldData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}:{}",
            self.class.name,
            self.name,
            self.descriptor.render()
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn methods_are_deduplicated() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();

        let point = class_graph.add_class(ClassData::new(
            BinaryName::from_string(String::from("demo/Point")).unwrap(),
            java.classes.lang.object,
            ClassAccessFlags::PUBLIC,
        ));
        let norm = || MethodData {
            class: point,
            name: UnqualifiedName::from_string(String::from("norm")).unwrap(),
            descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: Some(FieldType::double()),
            },
            access_flags: MethodAccessFlags::PUBLIC,
        };

        let first = class_graph.add_method(norm());
        let second = class_graph.add_method(norm());
        assert_eq!(first, second);
        assert_eq!(point.methods.len(), 1);
        assert_eq!(first.infer_invoke_type().unwrap(), InvokeType::Virtual);
    }

    #[test]
    fn interface_argument_slots_fit_a_byte() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();

        let sink = class_graph.add_class(ClassData::new(
            BinaryName::from_string(String::from("demo/Sink")).unwrap(),
            java.classes.lang.object,
            ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT,
        ));
        let take = |name: &str, longs: usize| {
            class_graph.add_method(MethodData {
                class: sink,
                name: UnqualifiedName::from_string(name.to_owned()).unwrap(),
                descriptor: MethodDescriptor {
                    parameters: vec![FieldType::long(); longs],
                    return_type: None,
                },
                access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
            })
        };

        let fits = take("fits", 127);
        assert_eq!(fits.infer_invoke_type().unwrap(), InvokeType::Interface(255));

        let overflows = take("overflows", 128);
        match overflows.infer_invoke_type() {
            Err(Error::TooManyArguments { slots, .. }) => assert_eq!(slots, 257),
            other => panic!("expected too many arguments, got {:?}", other),
        }
    }

    #[test]
    fn fields_are_inherited() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();

        let base = class_graph.add_class(ClassData::new(
            BinaryName::from_string(String::from("demo/Base")).unwrap(),
            java.classes.lang.object,
            ClassAccessFlags::PUBLIC,
        ));
        let derived = class_graph.add_class(ClassData::new(
            BinaryName::from_string(String::from("demo/Derived")).unwrap(),
            base,
            ClassAccessFlags::PUBLIC,
        ));
        let count = class_graph.add_field(FieldData {
            class: base,
            name: UnqualifiedName::from_string(String::from("count")).unwrap(),
            descriptor: FieldType::int(),
            access_flags: FieldAccessFlags::PROTECTED,
        });

        assert_eq!(derived.0.find_field("count"), Some(count));
        assert_eq!(derived.0.find_field("missing"), None);
    }

    #[test]
    fn functional_methods() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();

        let supplier = java.classes.function.supplier;
        assert_eq!(
            supplier.0.functional_method(),
            Some(java.members.function.supplier_get)
        );
        assert_eq!(java.classes.lang.object.0.functional_method(), None);
    }
}
