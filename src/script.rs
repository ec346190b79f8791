//! Line-oriented text front end for [`CodeBuilder`]
//!
//! A script describes one routine. The first line is the header, every other line is one
//! operation. Blank lines and lines starting with `#` are ignored.
//!
//! ```text
//! routine static demo/Math max (II)I
//! load_param 0
//! load_param 1
//! if_icmp lt - Lsecond
//! load_param 0
//! return
//! label Lsecond
//! load_param 1
//! return
//! ```
//!
//! The header is `routine <static|instance> <class> <name> <descriptor>`. Classes that are not
//! already in the class graph get added as plain subclasses of `java/lang/Object`.
//!
//! Labels are named freely and created on first mention. Jumps take the label their frame is
//! described relative to before their target, with `-` meaning the routine's entry frame (a
//! backward jump).
//!
//! Declarations:
//!
//!   - `field <static|instance> <name> <descriptor>` adds a field to the routine's class
//!
//! Operations (arguments in angle brackets):
//!
//!   - constants: `const <int|long|float|double|bool|char|byte|short> <value>`,
//!     `const string <text to the end of the line>`, `const null <descriptor>`,
//!     `default <descriptor>`
//!   - arithmetic: `add`, `sub`, `mul`, `div`, `rem`, `neg`, `and`, `or`, `xor`, `shl`, `shr`,
//!     `ushr`, `cmpl`, `cmpg`, `convert <primitive>`
//!   - stack: `pop`, `dup`, `dup_under`, `swap`
//!   - locals: `this`, `load_param <n>`, `load <n>`, `store`, `store <n>`, `inc <n> <delta>`,
//!     `kill`
//!   - control: `label <l>`, `label_from_entry <l>`, `label_from <from> <l>`,
//!     `goto <from|-> <l>`, `if_zero <cmp> <from|-> <l>`, `if_icmp <cmp> <from|-> <l>`,
//!     `if_acmp <eq|ne> <from|-> <l>`, `if_null <eq|ne> <from|-> <l>`, `return`, `throw`
//!   - fields and arrays: `get_field <name>`, `put_field <name>`, `new_array <descriptor>`,
//!     `array_load`, `array_store`, `array_length`
//!   - objects: `new <class>`, `cast <descriptor>`, `cast_unchecked <descriptor>`,
//!     `instance_of <descriptor>`, `box`, `unbox`
//!   - calls: `invoke <static|virtual|interface|special> <class> <name> <descriptor>`,
//!     `lambda <interface> <static|instance> <class> <name> <descriptor>`,
//!     `lambda_field <interface> <name>`

use crate::jvm::class_graph::{
    ClassData, ClassGraph, ClassId, FieldData, JavaLibrary, MethodData, MethodId,
};
use crate::jvm::code::{
    CodeBuilder, CodeSize, EqComparison, InstructionSink, OrdComparison, SynLabel,
};
use crate::jvm::{
    BaseType, BinaryName, ClassAccessFlags, DescriptorParser, Error, FieldAccessFlags, FieldType,
    MethodAccessFlags, MethodDescriptor, Name, RefType, UnqualifiedName,
};
use std::collections::HashMap;
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum ScriptError {
    Io(io::Error),

    /// Line could not be parsed
    Syntax { line: usize, message: String },

    /// Line parsed, but the operation was rejected by the assembler
    Assembly { line: usize, error: Error },
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::Io(error) => write!(f, "cannot read script: {}", error),
            ScriptError::Syntax { line, message } => write!(f, "line {}: {}", line, message),
            ScriptError::Assembly { line, error } => write!(f, "line {}: {}", line, error),
        }
    }
}

impl std::error::Error for ScriptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScriptError::Io(error) => Some(error),
            ScriptError::Syntax { .. } => None,
            ScriptError::Assembly { error, .. } => Some(error),
        }
    }
}

impl From<io::Error> for ScriptError {
    fn from(error: io::Error) -> Self {
        ScriptError::Io(error)
    }
}

/// Failure on a single line, before the line number is attached
enum LineError {
    Syntax(String),
    Assembly(Error),
}

impl LineError {
    fn at(self, line: usize) -> ScriptError {
        match self {
            LineError::Syntax(message) => ScriptError::Syntax { line, message },
            LineError::Assembly(error) => ScriptError::Assembly { line, error },
        }
    }
}

impl From<Error> for LineError {
    fn from(error: Error) -> Self {
        LineError::Assembly(error)
    }
}

impl From<String> for LineError {
    fn from(message: String) -> Self {
        LineError::Syntax(message)
    }
}

/// Assemble a script, sending the result to `sink`
pub fn assemble<'g>(
    class_graph: &'g ClassGraph<'g>,
    java: &'g JavaLibrary<'g>,
    source: &str,
    sink: &mut impl InstructionSink<'g>,
) -> Result<CodeSize, ScriptError> {
    let mut lines = source
        .lines()
        .enumerate()
        .map(|(index, text)| (index + 1, text.trim()))
        .filter(|(_, text)| !text.is_empty() && !text.starts_with('#'));

    let (header_line, header) = match lines.next() {
        Some(header) => header,
        None => {
            return Err(ScriptError::Syntax {
                line: 1,
                message: String::from("missing `routine` header"),
            })
        }
    };
    let mut script = Script::new(class_graph, java, header).map_err(|err| err.at(header_line))?;
    log::info!("Assembling {:?}", script.code.method.0);

    let mut last_line = header_line;
    for (line, text) in lines {
        script.line(text).map_err(|err| err.at(line))?;
        last_line = line;
    }

    script
        .code
        .finalize(sink)
        .map_err(|error| ScriptError::Assembly {
            line: last_line,
            error,
        })
}

struct Script<'g> {
    class_graph: &'g ClassGraph<'g>,
    code: CodeBuilder<'g>,
    labels: HashMap<String, SynLabel>,
}

impl<'g> Script<'g> {
    fn new(
        class_graph: &'g ClassGraph<'g>,
        java: &'g JavaLibrary<'g>,
        header: &str,
    ) -> Result<Script<'g>, LineError> {
        let tokens: Vec<&str> = header.split_whitespace().collect();
        let args = match tokens.split_first() {
            Some((&"routine", args)) => args,
            _ => {
                return Err(LineError::Syntax(format!(
                    "expected `routine` header but found `{}`",
                    header
                )))
            }
        };
        let [kind, class, name, descriptor] = arguments::<4>("routine", args)?;

        let mut access_flags = MethodAccessFlags::PUBLIC;
        if parse_staticness(kind)? {
            access_flags |= MethodAccessFlags::STATIC;
        }
        let class = resolve_class(class_graph, class, false)?;
        let method = class_graph.add_method(MethodData {
            class,
            name: UnqualifiedName::from_string(name.to_owned())?,
            descriptor: method_descriptor(class_graph, descriptor)?,
            access_flags,
        });

        Ok(Script {
            class_graph,
            code: CodeBuilder::new(java, method),
            labels: HashMap::new(),
        })
    }

    /// Label by name, made fresh the first time the name comes up
    fn label(&mut self, name: &str) -> SynLabel {
        if let Some(label) = self.labels.get(name) {
            return *label;
        }
        let label = self.code.fresh_label();
        self.labels.insert(name.to_owned(), label);
        label
    }

    fn from_label(&mut self, name: &str) -> Option<SynLabel> {
        if name == "-" {
            None
        } else {
            Some(self.label(name))
        }
    }

    fn field_type(&self, descriptor: &str) -> Result<FieldType<ClassId<'g>>, LineError> {
        field_type(self.class_graph, descriptor)
    }

    fn ref_type(&self, descriptor: &str) -> Result<RefType<ClassId<'g>>, LineError> {
        match self.field_type(descriptor)? {
            FieldType::Ref(ref_type) => Ok(ref_type),
            FieldType::Base(_) => Err(LineError::Syntax(format!(
                "expected a reference type but found `{}`",
                descriptor
            ))),
        }
    }

    /// Declare a method on some class, so it can be called
    fn method(
        &self,
        kind: &str,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<MethodId<'g>, LineError> {
        let (access_flags, interface) = match kind {
            "static" => (MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC, false),
            "virtual" | "instance" | "special" => (MethodAccessFlags::PUBLIC, false),
            "interface" => (MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT, true),
            other => return Err(LineError::Syntax(format!("unknown method kind `{}`", other))),
        };
        let class = resolve_class(self.class_graph, class, interface)?;
        Ok(self.class_graph.add_method(MethodData {
            class,
            name: UnqualifiedName::from_string(name.to_owned())?,
            descriptor: method_descriptor(self.class_graph, descriptor)?,
            access_flags,
        }))
    }

    fn line(&mut self, text: &str) -> Result<(), LineError> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let (operation, args) = match tokens.split_first() {
            Some((operation, args)) => (*operation, args),
            None => return Ok(()),
        };

        let outcome: Result<&mut CodeBuilder<'g>, Error> = match operation {
            "field" => {
                let [kind, name, descriptor] = arguments::<3>(operation, args)?;
                let mut access_flags = FieldAccessFlags::PUBLIC;
                if parse_staticness(kind)? {
                    access_flags |= FieldAccessFlags::STATIC;
                }
                let field = FieldData {
                    class: self.code.method.class,
                    name: UnqualifiedName::from_string(name.to_owned())?,
                    descriptor: self.field_type(descriptor)?,
                    access_flags,
                };
                let field = self.class_graph.add_field(field);
                log::debug!("declared field {:?}", field.0);
                return Ok(());
            }

            // Constants
            "const" => {
                let (kind, value) = match args {
                    [kind, value, ..] => (*kind, *value),
                    _ => {
                        return Err(LineError::Syntax(String::from(
                            "`const` needs a kind and a value",
                        )))
                    }
                };
                if kind == "string" {
                    let string = rest_after(text, 2);
                    self.code.const_string(string)
                } else {
                    let [_, _] = arguments::<2>(operation, args)?;
                    match kind {
                        "int" => self.code.const_int(parse(value, "int")?),
                        "long" => self.code.const_long(parse(value, "long")?),
                        "float" => self.code.const_float(parse(value, "float")?),
                        "double" => self.code.const_double(parse(value, "double")?),
                        "bool" => self.code.const_bool(parse(value, "bool")?),
                        "char" => self.code.const_char(parse(value, "char")?),
                        "byte" => self.code.const_byte(parse(value, "byte")?),
                        "short" => self.code.const_short(parse(value, "short")?),
                        "null" => {
                            let ref_type = self.ref_type(value)?;
                            self.code.const_null(ref_type)
                        }
                        other => {
                            return Err(LineError::Syntax(format!(
                                "unknown constant kind `{}`",
                                other
                            )))
                        }
                    }
                }
            }
            "default" => {
                let [descriptor] = arguments::<1>(operation, args)?;
                let field_type = self.field_type(descriptor)?;
                self.code.default_value(field_type)
            }

            // Arithmetic
            "add" | "sub" | "mul" | "div" | "rem" | "neg" | "and" | "or" | "xor" | "shl"
            | "shr" | "ushr" | "cmpl" | "cmpg" => {
                let [] = arguments::<0>(operation, args)?;
                match operation {
                    "add" => self.code.add(),
                    "sub" => self.code.sub(),
                    "mul" => self.code.mul(),
                    "div" => self.code.div(),
                    "rem" => self.code.rem(),
                    "neg" => self.code.neg(),
                    "and" => self.code.and(),
                    "or" => self.code.or(),
                    "xor" => self.code.xor(),
                    "shl" => self.code.shl(),
                    "shr" => self.code.shr(),
                    "ushr" => self.code.ushr(),
                    "cmpl" => self.code.cmp(false),
                    _ => self.code.cmp(true),
                }
            }
            "convert" => {
                let [keyword] = arguments::<1>(operation, args)?;
                let base_type = BaseType::ALL
                    .iter()
                    .copied()
                    .find(|base_type| base_type.keyword() == keyword)
                    .ok_or_else(|| format!("unknown primitive type `{}`", keyword))?;
                self.code.convert(base_type)
            }

            // Stack
            "pop" | "dup" | "dup_under" | "swap" => {
                let [] = arguments::<0>(operation, args)?;
                match operation {
                    "pop" => self.code.pop(),
                    "dup" => self.code.dup(),
                    "dup_under" => self.code.dup_under(),
                    _ => self.code.swap(),
                }
            }

            // Locals
            "this" => {
                let [] = arguments::<0>(operation, args)?;
                self.code.load_this()
            }
            "load_param" => {
                let [index] = arguments::<1>(operation, args)?;
                self.code.load_parameter(parse(index, "parameter index")?)
            }
            "load" => {
                let [index] = arguments::<1>(operation, args)?;
                self.code.load_local(parse(index, "local index")?)
            }
            "store" => match args {
                [] => self.code.store_local(),
                [index] => self.code.store_local_at(parse(index, "local index")?),
                _ => {
                    return Err(LineError::Syntax(String::from(
                        "`store` takes at most one argument",
                    )))
                }
            },
            "inc" => {
                let [index, delta] = arguments::<2>(operation, args)?;
                let index = parse(index, "local index")?;
                self.code.increment(index, parse(delta, "increment")?)
            }
            "kill" => {
                let [] = arguments::<0>(operation, args)?;
                self.code.kill_local()
            }

            // Control flow
            "label" => {
                let [label] = arguments::<1>(operation, args)?;
                let label = self.label(label);
                self.code.label(label)
            }
            "label_from_entry" => {
                let [label] = arguments::<1>(operation, args)?;
                let label = self.label(label);
                self.code.label_from_entry(label)
            }
            "label_from" => {
                let [from, label] = arguments::<2>(operation, args)?;
                let from = self.label(from);
                let label = self.label(label);
                self.code.label_from(from, label)
            }
            "goto" => {
                let [from, to] = arguments::<2>(operation, args)?;
                let from = self.from_label(from);
                let to = self.label(to);
                self.code.goto(from, to)
            }
            "if_zero" | "if_icmp" => {
                let [comparison, from, to] = arguments::<3>(operation, args)?;
                let comparison = OrdComparison::from_mnemonic(comparison)
                    .ok_or_else(|| format!("unknown comparison `{}`", comparison))?;
                let from = self.from_label(from);
                let to = self.label(to);
                if operation == "if_zero" {
                    self.code.if_zero(comparison, from, to)
                } else {
                    self.code.if_icmp(comparison, from, to)
                }
            }
            "if_acmp" | "if_null" => {
                let [comparison, from, to] = arguments::<3>(operation, args)?;
                let comparison = EqComparison::from_mnemonic(comparison)
                    .ok_or_else(|| format!("unknown comparison `{}`", comparison))?;
                let from = self.from_label(from);
                let to = self.label(to);
                if operation == "if_acmp" {
                    self.code.if_acmp(comparison, from, to)
                } else {
                    self.code.if_null(comparison, from, to)
                }
            }
            "return" => {
                let [] = arguments::<0>(operation, args)?;
                self.code.return_value()
            }
            "throw" => {
                let [] = arguments::<0>(operation, args)?;
                self.code.throw_value()
            }

            // Fields and arrays
            "get_field" => {
                let [name] = arguments::<1>(operation, args)?;
                self.code.get_own_field(name)
            }
            "put_field" => {
                let [name] = arguments::<1>(operation, args)?;
                self.code.put_own_field(name)
            }
            "new_array" => {
                let [descriptor] = arguments::<1>(operation, args)?;
                let component = self.field_type(descriptor)?;
                self.code.new_array(component)
            }
            "array_load" | "array_store" | "array_length" => {
                let [] = arguments::<0>(operation, args)?;
                match operation {
                    "array_load" => self.code.array_load(),
                    "array_store" => self.code.array_store(),
                    _ => self.code.array_length(),
                }
            }

            // Objects
            "new" => {
                let [class] = arguments::<1>(operation, args)?;
                let class = resolve_class(self.class_graph, class, false)?;
                self.code.new_object(class)
            }
            "cast" | "cast_unchecked" => {
                let [descriptor] = arguments::<1>(operation, args)?;
                let target = self.ref_type(descriptor)?;
                self.code.cast(target, operation == "cast_unchecked")
            }
            "instance_of" => {
                let [descriptor] = arguments::<1>(operation, args)?;
                let target = self.ref_type(descriptor)?;
                self.code.instance_of(target)
            }
            "box" => {
                let [] = arguments::<0>(operation, args)?;
                self.code.box_value()
            }
            "unbox" => {
                let [] = arguments::<0>(operation, args)?;
                self.code.unbox_value()
            }

            // Calls
            "invoke" => {
                let [kind, class, name, descriptor] = arguments::<4>(operation, args)?;
                let method = self.method(kind, class, name, descriptor)?;
                if kind == "special" {
                    let target = self.code.method.class;
                    self.code.invoke_on(method, target)
                } else {
                    self.code.invoke(method)
                }
            }
            "lambda" => {
                let [interface, kind, class, name, descriptor] = arguments::<5>(operation, args)?;
                let interface = resolve_class(self.class_graph, interface, true)?;
                let kind = if parse_staticness(kind)? {
                    "static"
                } else {
                    "virtual"
                };
                let method = self.method(kind, class, name, descriptor)?;
                self.code.lambda(method, interface)
            }
            "lambda_field" => {
                let [interface, name] = arguments::<2>(operation, args)?;
                let interface = resolve_class(self.class_graph, interface, true)?;
                let class = self.code.method.class;
                let field = class.0.find_field(name).ok_or_else(|| {
                    Error::MissingMember(format!("{}.{}", class.name, name))
                })?;
                self.code.lambda_field(field, interface)
            }

            other => return Err(LineError::Syntax(format!("unknown operation `{}`", other))),
        };
        outcome?;
        Ok(())
    }
}

/// Split a line's arguments into exactly `N` tokens
fn arguments<'a, const N: usize>(
    operation: &str,
    args: &[&'a str],
) -> Result<[&'a str; N], LineError> {
    <[&'a str; N]>::try_from(args).map_err(|_| {
        LineError::Syntax(format!(
            "`{}` takes {} arguments but got {}",
            operation,
            N,
            args.len()
        ))
    })
}

fn parse<T: std::str::FromStr>(token: &str, what: &str) -> Result<T, LineError> {
    token
        .parse()
        .map_err(|_| LineError::Syntax(format!("invalid {} `{}`", what, token)))
}

fn parse_staticness(kind: &str) -> Result<bool, LineError> {
    match kind {
        "static" => Ok(true),
        "instance" => Ok(false),
        other => Err(LineError::Syntax(format!(
            "expected `static` or `instance` but found `{}`",
            other
        ))),
    }
}

/// Text of a line after skipping its first `tokens` whitespace-separated tokens
fn rest_after(text: &str, tokens: usize) -> &str {
    let mut rest = text.trim_start();
    for _ in 0..tokens {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = rest[end..].trim_start();
    }
    rest.trim_end()
}

/// Find a class by name, adding it to the graph if it is missing
fn resolve_class<'g>(
    class_graph: &'g ClassGraph<'g>,
    name: &str,
    interface: bool,
) -> Result<ClassId<'g>, LineError> {
    let name = BinaryName::from_string(name.to_owned())?;
    if let Some(class) = class_graph.lookup_class(&name) {
        return Ok(class);
    }
    let object = class_graph
        .lookup_class(&BinaryName::OBJECT)
        .ok_or_else(|| Error::MissingMember(String::from("java/lang/Object")))?;
    let access_flags = if interface {
        ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT
    } else {
        ClassAccessFlags::PUBLIC
    };
    log::debug!("adding class {} to the class graph", name);
    Ok(class_graph.add_class(ClassData::new(name, object, access_flags)))
}

fn field_type<'g>(
    class_graph: &'g ClassGraph<'g>,
    descriptor: &str,
) -> Result<FieldType<ClassId<'g>>, LineError> {
    DescriptorParser::field_type(descriptor)?
        .try_map(|name| resolve_class(class_graph, name.as_str(), false))
}

fn method_descriptor<'g>(
    class_graph: &'g ClassGraph<'g>,
    descriptor: &str,
) -> Result<MethodDescriptor<ClassId<'g>>, LineError> {
    DescriptorParser::method_descriptor(descriptor)?
        .try_map(|name| resolve_class(class_graph, name.as_str(), false))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_graph::ClassGraphArenas;
    use crate::jvm::code::{Instruction, Listing};
    use crate::jvm::verifier::FrameDescriptor;

    fn run(source: &str) -> Result<String, ScriptError> {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();
        let mut listing = Listing::new();
        assemble(&class_graph, &java, source, &mut listing)?;
        Ok(listing.to_string())
    }

    #[test]
    fn straight_line() {
        let listing = run("routine static demo/Math add (II)I\n\
                           load_param 0\n\
                           load_param 1\n\
                           add\n\
                           return\n")
        .unwrap();
        assert_eq!(
            listing,
            "  iload 0\n  iload 1\n  iadd\n  ireturn\n  ; max_stack=2 max_locals=2\n"
        );
    }

    #[test]
    fn branches_with_named_labels() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();
        let mut listing = Listing::new();
        let source = "
            # larger of two ints
            routine static demo/Math max (II)I
            load_param 0
            load_param 1
            if_icmp lt - second
            load_param 0
            return
            label second
            load_param 1
            return
        ";
        let size = assemble(&class_graph, &java, source, &mut listing).unwrap();
        assert_eq!(size.max_stack, 2);
        assert_eq!(
            listing.frames().collect::<Vec<_>>(),
            vec![&FrameDescriptor::SameLocalsNoStack]
        );
        assert_eq!(listing.instructions().filter(|i| i.is_terminal()).count(), 2);
    }

    #[test]
    fn string_constants_keep_spaces() {
        let listing = run("routine static demo/Text greet ()Ljava/lang/String;\n\
                           const string hello,  world\n\
                           return\n")
        .unwrap();
        assert!(listing.starts_with("  ldc \"hello,  world\"\n"));
    }

    #[test]
    fn fields_on_own_class() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();
        let mut listing = Listing::new();
        let source = "routine instance demo/Counter bump ()V\n\
                      field instance count I\n\
                      this\n\
                      this\n\
                      get_field count\n\
                      const int 1\n\
                      add\n\
                      put_field count\n\
                      return\n";
        assemble(&class_graph, &java, source, &mut listing).unwrap();
        let instructions: Vec<&Instruction> = listing.instructions().collect();
        assert!(matches!(instructions[2], Instruction::GetField(_)));
        assert!(matches!(instructions[5], Instruction::PutField(_)));
    }

    #[test]
    fn errors_carry_line_numbers() {
        let error = run("routine static demo/Math bad (J)J\n\nload_param 0\nadd\n").unwrap_err();
        assert!(matches!(
            error,
            ScriptError::Assembly {
                line: 4,
                error: Error::StackUnderflow { .. }
            }
        ));

        let error = run("routine static demo/Math bad ()V\nfrobnicate\n").unwrap_err();
        assert!(matches!(error, ScriptError::Syntax { line: 2, .. }));

        let error = run("load_param 0\n").unwrap_err();
        assert!(matches!(error, ScriptError::Syntax { line: 1, .. }));

        let error = run("routine static demo/Math bad ()V\nconst int 1 2\n").unwrap_err();
        assert!(matches!(error, ScriptError::Syntax { line: 2, .. }));
    }

    #[test]
    fn unresolved_labels_fail_at_the_end() {
        let error = run("routine static demo/Loop spin ()V\n\
                         goto - missing\n")
        .unwrap_err();
        assert!(matches!(
            error,
            ScriptError::Assembly {
                line: 2,
                error: Error::UnresolvedLabel(_)
            }
        ));
    }
}
