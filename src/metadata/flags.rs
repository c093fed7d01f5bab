//! Access flags of classes, methods and fields.
//!
//! The bit values are the ones of the JVM class file format, so flags read from or written to
//! class files can be passed through unchanged.

use bitflags::bitflags;

bitflags! {
    #[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
    /// Class access and property flags
    pub struct ClassAccessFlags: u32 {
        /// Declared public
        const PUBLIC = 0x0001;
        /// Declared final, no subclasses allowed
        const FINAL = 0x0010;
        /// Treat superclass methods specially when invoked by invokespecial
        const SUPER = 0x0020;
        /// Is an interface, not a class
        const INTERFACE = 0x0200;
        /// Declared abstract, must not be instantiated
        const ABSTRACT = 0x0400;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
        /// Declared as an annotation interface
        const ANNOTATION = 0x2000;
        /// Declared as an enum class
        const ENUM = 0x4000;
    }
}

bitflags! {
    #[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
    /// Method access and property flags
    pub struct MethodAccessFlags: u32 {
        /// Declared public
        const PUBLIC = 0x0001;
        /// Declared private
        const PRIVATE = 0x0002;
        /// Declared protected
        const PROTECTED = 0x0004;
        /// Declared static
        const STATIC = 0x0008;
        /// Declared final, must not be overridden
        const FINAL = 0x0010;
        /// Declared synchronized
        const SYNCHRONIZED = 0x0020;
        /// A bridge method, generated by the compiler
        const BRIDGE = 0x0040;
        /// Declared with variable number of arguments
        const VARARGS = 0x0080;
        /// Declared native
        const NATIVE = 0x0100;
        /// Declared abstract, no implementation is provided
        const ABSTRACT = 0x0400;
        /// Declared strictfp
        const STRICT = 0x0800;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
        /// Instance initializer
        const CONSTRUCTOR = 0x10000;
    }
}

bitflags! {
    #[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
    /// Field access and property flags
    pub struct FieldAccessFlags: u32 {
        /// Declared public
        const PUBLIC = 0x0001;
        /// Declared private
        const PRIVATE = 0x0002;
        /// Declared protected
        const PROTECTED = 0x0004;
        /// Declared static
        const STATIC = 0x0008;
        /// Declared final, never directly assigned to after object construction
        const FINAL = 0x0010;
        /// Declared volatile
        const VOLATILE = 0x0040;
        /// Declared transient
        const TRANSIENT = 0x0080;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
        /// Declared as an element of an enum
        const ENUM = 0x4000;
    }
}

impl ClassAccessFlags {
    /// True for interfaces.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.contains(ClassAccessFlags::INTERFACE)
    }

    /// True for final classes.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.contains(ClassAccessFlags::FINAL)
    }
}

impl MethodAccessFlags {
    /// `public static synthetic`, the flags of outlined conversions and dispatch holders.
    #[must_use]
    pub fn public_static_synthetic() -> Self {
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC | MethodAccessFlags::SYNTHETIC
    }

    /// `private synthetic` instance initializer flags.
    #[must_use]
    pub fn private_constructor() -> Self {
        MethodAccessFlags::PRIVATE | MethodAccessFlags::SYNTHETIC | MethodAccessFlags::CONSTRUCTOR
    }

    /// Parses a single Java modifier keyword.
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "public" => MethodAccessFlags::PUBLIC,
            "private" => MethodAccessFlags::PRIVATE,
            "protected" => MethodAccessFlags::PROTECTED,
            "static" => MethodAccessFlags::STATIC,
            "final" => MethodAccessFlags::FINAL,
            "synchronized" => MethodAccessFlags::SYNCHRONIZED,
            "native" => MethodAccessFlags::NATIVE,
            "abstract" => MethodAccessFlags::ABSTRACT,
            "strictfp" => MethodAccessFlags::STRICT,
            "synthetic" => MethodAccessFlags::SYNTHETIC,
            _ => return None,
        })
    }

    /// True if declared static.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.contains(MethodAccessFlags::STATIC)
    }

    /// True if declared private.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.contains(MethodAccessFlags::PRIVATE)
    }

    /// True if declared public.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.contains(MethodAccessFlags::PUBLIC)
    }

    /// True if declared final.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.contains(MethodAccessFlags::FINAL)
    }

    /// True if declared abstract.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.contains(MethodAccessFlags::ABSTRACT)
    }

    /// True if not present in source code.
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.contains(MethodAccessFlags::SYNTHETIC)
    }
}

impl FieldAccessFlags {
    /// Parses a single Java modifier keyword.
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "public" => FieldAccessFlags::PUBLIC,
            "private" => FieldAccessFlags::PRIVATE,
            "protected" => FieldAccessFlags::PROTECTED,
            "static" => FieldAccessFlags::STATIC,
            "final" => FieldAccessFlags::FINAL,
            "volatile" => FieldAccessFlags::VOLATILE,
            "transient" => FieldAccessFlags::TRANSIENT,
            "synthetic" => FieldAccessFlags::SYNTHETIC,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jvm_bit_values() {
        assert_eq!(ClassAccessFlags::INTERFACE.bits(), 0x0200);
        assert_eq!(MethodAccessFlags::SYNTHETIC.bits(), 0x1000);
        assert_eq!(FieldAccessFlags::FINAL.bits(), 0x0010);
    }

    #[test]
    fn method_keywords() {
        let flags = ["public", "static"]
            .iter()
            .filter_map(|k| MethodAccessFlags::from_keyword(k))
            .fold(MethodAccessFlags::empty(), |acc, f| acc | f);
        assert!(flags.is_public());
        assert!(flags.is_static());
        assert!(!flags.is_final());
        assert!(MethodAccessFlags::from_keyword("default").is_none());
    }

    #[test]
    fn synthetic_presets() {
        let flags = MethodAccessFlags::public_static_synthetic();
        assert!(flags.is_static() && flags.is_public());
        assert!(flags.contains(MethodAccessFlags::SYNTHETIC));
        assert!(MethodAccessFlags::private_constructor().is_private());
    }
}
