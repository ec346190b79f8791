use std::borrow::Cow;
use std::fmt;

/// Names of methods and fields
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.2>
#[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct UnqualifiedName(Cow<'static, str>);

/// Names of classes and interfaces, with `/` separating the package segments
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.1>
#[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct BinaryName(Cow<'static, str>);

pub trait Name: Sized {
    /// Check if a string would be a valid name of this sort
    fn check_valid(name: &str) -> Result<(), String>;

    /// Wrap an already validated string
    fn from_cow_unchecked(name: Cow<'static, str>) -> Self;

    fn as_str(&self) -> &str;

    /// Validate then wrap a string
    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(Self::from_cow_unchecked(Cow::Owned(name)))
    }
}

impl Name for UnqualifiedName {
    fn check_valid(name: &str) -> Result<(), String> {
        if name.is_empty() {
            return Err(String::from("unqualified name is empty"));
        }
        if name.contains(&['.', ';', '[', '/'][..]) {
            return Err(format!("unqualified name '{}' has an illegal character", name));
        }
        let special = name == "<init>" || name == "<clinit>";
        if !special && name.contains(&['<', '>'][..]) {
            return Err(format!("unqualified name '{}' has an angle bracket", name));
        }
        Ok(())
    }

    fn from_cow_unchecked(name: Cow<'static, str>) -> Self {
        UnqualifiedName(name)
    }

    fn as_str(&self) -> &str {
        &self.0
    }
}

impl Name for BinaryName {
    fn check_valid(name: &str) -> Result<(), String> {
        if name.is_empty() {
            return Err(String::from("binary name is empty"));
        }
        for segment in name.split('/') {
            if segment.is_empty() || segment.contains(&['.', ';', '[', '<', '>'][..]) {
                return Err(format!("binary name '{}' has a malformed segment", name));
            }
        }
        Ok(())
    }

    fn from_cow_unchecked(name: Cow<'static, str>) -> Self {
        BinaryName(name)
    }

    fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UnqualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UnqualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for BinaryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for BinaryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl UnqualifiedName {
    const fn name(value: &'static str) -> UnqualifiedName {
        UnqualifiedName(Cow::Borrowed(value))
    }

    // Boxing
    pub const VALUEOF: Self = Self::name("valueOf");
    pub const BOOLEANVALUE: Self = Self::name("booleanValue");
    pub const BYTEVALUE: Self = Self::name("byteValue");
    pub const CHARVALUE: Self = Self::name("charValue");
    pub const SHORTVALUE: Self = Self::name("shortValue");
    pub const INTVALUE: Self = Self::name("intValue");
    pub const LONGVALUE: Self = Self::name("longValue");
    pub const FLOATVALUE: Self = Self::name("floatValue");
    pub const DOUBLEVALUE: Self = Self::name("doubleValue");

    // Functional interfaces
    pub const ACCEPT: Self = Self::name("accept");
    pub const APPLY: Self = Self::name("apply");
    pub const APPLYASINT: Self = Self::name("applyAsInt");
    pub const GET: Self = Self::name("get");
    pub const RUN: Self = Self::name("run");

    pub const METAFACTORY: Self = Self::name("metafactory");

    // Only constructors get angle brackets
    pub const INIT: Self = Self::name("<init>");
}

impl BinaryName {
    const fn name(value: &'static str) -> BinaryName {
        BinaryName(Cow::Borrowed(value))
    }

    // java.lang
    pub const BOOLEAN: Self = Self::name("java/lang/Boolean");
    pub const BYTE: Self = Self::name("java/lang/Byte");
    pub const CHARACTER: Self = Self::name("java/lang/Character");
    pub const CHARSEQUENCE: Self = Self::name("java/lang/CharSequence");
    pub const CLONEABLE: Self = Self::name("java/lang/Cloneable");
    pub const DOUBLE: Self = Self::name("java/lang/Double");
    pub const ERROR: Self = Self::name("java/lang/Error");
    pub const EXCEPTION: Self = Self::name("java/lang/Exception");
    pub const FLOAT: Self = Self::name("java/lang/Float");
    pub const INTEGER: Self = Self::name("java/lang/Integer");
    pub const LONG: Self = Self::name("java/lang/Long");
    pub const NUMBER: Self = Self::name("java/lang/Number");
    pub const OBJECT: Self = Self::name("java/lang/Object");
    pub const RUNNABLE: Self = Self::name("java/lang/Runnable");
    pub const RUNTIMEEXCEPTION: Self = Self::name("java/lang/RuntimeException");
    pub const SHORT: Self = Self::name("java/lang/Short");
    pub const STRING: Self = Self::name("java/lang/String");
    pub const THROWABLE: Self = Self::name("java/lang/Throwable");

    // java.io
    pub const SERIALIZABLE: Self = Self::name("java/io/Serializable");

    // java.lang.invoke
    pub const CALLSITE: Self = Self::name("java/lang/invoke/CallSite");
    pub const LAMBDAMETAFACTORY: Self = Self::name("java/lang/invoke/LambdaMetafactory");
    pub const METHODHANDLE: Self = Self::name("java/lang/invoke/MethodHandle");
    pub const METHODHANDLES_LOOKUP: Self = Self::name("java/lang/invoke/MethodHandles$Lookup");
    pub const METHODTYPE: Self = Self::name("java/lang/invoke/MethodType");

    // java.util.function
    pub const CONSUMER: Self = Self::name("java/util/function/Consumer");
    pub const FUNCTION: Self = Self::name("java/util/function/Function");
    pub const INTUNARYOPERATOR: Self = Self::name("java/util/function/IntUnaryOperator");
    pub const SUPPLIER: Self = Self::name("java/util/function/Supplier");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unqualified_names() {
        assert!(UnqualifiedName::from_string(String::from("apply")).is_ok());
        assert!(UnqualifiedName::from_string(String::from("<init>")).is_ok());
        assert!(UnqualifiedName::from_string(String::from("<lambda>")).is_err());
        assert!(UnqualifiedName::from_string(String::from("java/lang")).is_err());
        assert!(UnqualifiedName::from_string(String::new()).is_err());
    }

    #[test]
    fn binary_names() {
        assert!(BinaryName::from_string(String::from("demo/Math")).is_ok());
        assert!(BinaryName::from_string(String::from("demo//Math")).is_err());
        assert!(BinaryName::from_string(String::from("[I")).is_err());
    }
}
