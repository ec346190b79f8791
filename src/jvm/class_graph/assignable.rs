use super::ClassId;
use crate::jvm::{BinaryName, RefType};
use crate::util::RefId;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Subtyping relationship between types
pub trait Assignable {
    /// Can a value of the first type be used where the second type is expected?
    fn is_assignable(&self, super_type: &Self) -> bool;
}

/// Walks up superclasses (and super interfaces, when the target is an interface)
impl<'g> Assignable for ClassId<'g> {
    fn is_assignable(&self, super_type: &ClassId<'g>) -> bool {
        let include_interfaces = super_type.is_interface();
        let mut seen: HashSet<ClassId<'g>> = HashSet::new();
        let mut to_visit: Vec<ClassId<'g>> = vec![*self];

        while let Some(class) = to_visit.pop() {
            if class == *super_type {
                return true;
            }
            if !seen.insert(class) {
                continue;
            }
            to_visit.extend(class.0.superclass);
            if include_interfaces {
                to_visit.extend(class.0.interfaces.iter().map(RefId));
            }
        }

        false
    }
}

/// Same as `isJavaAssignable(sub_type, super_type)` in the JVM verifier specification
impl<'g> Assignable for RefType<ClassId<'g>> {
    fn is_assignable(&self, super_type: &RefType<ClassId<'g>>) -> bool {
        match (self, super_type) {
            (RefType::Object(cls1), RefType::Object(cls2)) => cls1.is_assignable(cls2),

            // Every array is an `Object`, `Cloneable`, and `Serializable`
            (RefType::PrimitiveArray(_) | RefType::ObjectArray(_), RefType::Object(cls)) => {
                is_array_supertype(&cls.name)
            }

            (RefType::PrimitiveArray(arr1), RefType::PrimitiveArray(arr2)) => arr1 == arr2,

            // `int[][]` is an `Object[]`, but `int[]` is not
            (RefType::PrimitiveArray(arr1), RefType::ObjectArray(arr2)) => {
                arr1.additional_dimensions > arr2.additional_dimensions
                    && is_array_supertype(&arr2.element_type.name)
            }

            // Arrays are covariant
            (RefType::ObjectArray(arr1), RefType::ObjectArray(arr2)) => {
                match arr1.additional_dimensions.cmp(&arr2.additional_dimensions) {
                    Ordering::Less => false,
                    Ordering::Equal => arr1.element_type.is_assignable(&arr2.element_type),
                    Ordering::Greater => is_array_supertype(&arr2.element_type.name),
                }
            }

            (RefType::Object(_), _) | (RefType::ObjectArray(_), RefType::PrimitiveArray(_)) => {
                false
            }
        }
    }
}

fn is_array_supertype(name: &BinaryName) -> bool {
    name == &BinaryName::OBJECT || name == &BinaryName::CLONEABLE || name == &BinaryName::SERIALIZABLE
}

#[cfg(test)]
mod test {
    use crate::jvm::class_graph::{Assignable, ClassGraph, ClassGraphArenas};
    use crate::jvm::{FieldType, RefType};

    #[test]
    fn class_hierarchy() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();
        let lang = &java.classes.lang;

        assert!(lang.integer.is_assignable(&lang.number));
        assert!(lang.integer.is_assignable(&lang.object));
        assert!(lang.runtime_exception.is_assignable(&lang.throwable));
        assert!(!lang.number.is_assignable(&lang.integer));
        assert!(!lang.string.is_assignable(&lang.throwable));
    }

    #[test]
    fn interfaces() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();
        let lang = &java.classes.lang;
        let serializable = &java.classes.io.serializable;

        assert!(lang.string.is_assignable(&lang.char_sequence));
        assert!(lang.integer.is_assignable(serializable));
        assert!(lang.char_sequence.is_assignable(&lang.object));
        assert!(!lang.object.is_assignable(&lang.char_sequence));
        assert!(!lang.char_sequence.is_assignable(&lang.string));
    }

    #[test]
    fn arrays() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();
        let lang = &java.classes.lang;

        let object = RefType::Object(lang.object);
        let cloneable = RefType::Object(lang.cloneable);
        let ints = RefType::array(FieldType::int());
        let longs = RefType::array(FieldType::long());
        let int_matrix = RefType::array(FieldType::array(FieldType::int()));
        let objects = RefType::array(FieldType::object(lang.object));
        let numbers = RefType::array(FieldType::object(lang.number));
        let integers = RefType::array(FieldType::object(lang.integer));

        assert!(ints.is_assignable(&object));
        assert!(ints.is_assignable(&cloneable));
        assert!(!object.is_assignable(&ints));
        assert!(!ints.is_assignable(&longs));
        assert!(!ints.is_assignable(&objects));
        assert!(int_matrix.is_assignable(&objects));

        assert!(integers.is_assignable(&numbers));
        assert!(!numbers.is_assignable(&integers));
        assert!(!integers.is_assignable(&ints));
    }
}
