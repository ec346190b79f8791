use bitflags::bitflags;

bitflags! {
    /// Access flags on classes
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.1-200-E.1
    pub struct ClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
    }
}

bitflags! {
    /// Access flags on methods
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.6-200-A.1
    pub struct MethodAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
    }
}

bitflags! {
    /// Access flags on fields
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.5-200-A.1
    pub struct FieldAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const SYNTHETIC = 0x1000;
    }
}

impl MethodAccessFlags {
    /// Flags for a Java source modifier keyword (eg. `static`)
    pub fn from_keyword(keyword: &str) -> Option<MethodAccessFlags> {
        Some(match keyword {
            "public" => MethodAccessFlags::PUBLIC,
            "private" => MethodAccessFlags::PRIVATE,
            "protected" => MethodAccessFlags::PROTECTED,
            "static" => MethodAccessFlags::STATIC,
            "final" => MethodAccessFlags::FINAL,
            "synchronized" => MethodAccessFlags::SYNCHRONIZED,
            "native" => MethodAccessFlags::NATIVE,
            "abstract" => MethodAccessFlags::ABSTRACT,
            "instance" => MethodAccessFlags::empty(),
            _ => return None,
        })
    }
}

impl FieldAccessFlags {
    /// Flags for a Java source modifier keyword (eg. `static`)
    pub fn from_keyword(keyword: &str) -> Option<FieldAccessFlags> {
        Some(match keyword {
            "public" => FieldAccessFlags::PUBLIC,
            "private" => FieldAccessFlags::PRIVATE,
            "protected" => FieldAccessFlags::PROTECTED,
            "static" => FieldAccessFlags::STATIC,
            "final" => FieldAccessFlags::FINAL,
            "volatile" => FieldAccessFlags::VOLATILE,
            "transient" => FieldAccessFlags::TRANSIENT,
            "instance" => FieldAccessFlags::empty(),
            _ => return None,
        })
    }
}
