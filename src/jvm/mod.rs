//! JVM types, class graph, and the type-tracking code assembler
//!
//! A routine body gets assembled against a [`class_graph::ClassGraph`], which knows the classes,
//! fields, and methods that instructions can refer to:
//!
//! ```
//! use stackmap_asm::jvm::class_graph::{ClassData, ClassGraph, ClassGraphArenas, MethodData};
//! use stackmap_asm::jvm::code::{CodeBuilder, Listing};
//! use stackmap_asm::jvm::{
//!     BinaryName, ClassAccessFlags, FieldType, MethodAccessFlags, MethodDescriptor, Name,
//!     UnqualifiedName,
//! };
//!
//! let arenas = ClassGraphArenas::new();
//! let class_graph = ClassGraph::new(&arenas);
//! let java = class_graph.insert_java_library_types();
//!
//! let class = class_graph.add_class(ClassData::new(
//!     BinaryName::from_string(String::from("demo/Math")).unwrap(),
//!     java.classes.lang.object,
//!     ClassAccessFlags::PUBLIC,
//! ));
//! let method = class_graph.add_method(MethodData {
//!     class,
//!     name: UnqualifiedName::from_string(String::from("square")).unwrap(),
//!     descriptor: MethodDescriptor {
//!         parameters: vec![FieldType::long()],
//!         return_type: Some(FieldType::long()),
//!     },
//!     access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
//! });
//!
//! let mut code = CodeBuilder::new(&java, method);
//! code.load_parameter(0).unwrap();
//! code.dup().unwrap();
//! code.mul().unwrap();
//! code.return_value().unwrap();
//!
//! let mut listing = Listing::new();
//! let size = code.finalize(&mut listing).unwrap();
//! assert_eq!(size.max_stack, 4);
//! assert_eq!(size.max_locals, 2);
//! ```

mod access_flags;
pub mod class_graph;
pub mod code;
mod descriptors;
mod errors;
mod names;
pub mod verifier;

pub use access_flags::*;
pub use descriptors::*;
pub use errors::*;
pub use names::*;
