//! Type, prototype and member references.
//!
//! All references are cheap to clone: names are stored as `Arc<str>` and compared by value, so
//! two references built independently from the same source name are equal and hash alike. This
//! is what allows the synthesis caches to key on references without an interning table.
//!
//! Types use Java source notation (`java.util.function.Function`, `int`, `java.lang.Object[]`).
//!
//! # Vivified types
//!
//! A vivified type `V(T)` is an engine-internal mirror of library type `T`. It is spelled by
//! prefixing the source name with [`VIVIFIED_PREFIX`] and never survives the final rewrite.
//!
//! ```rust
//! use vivify::metadata::types::TypeRef;
//!
//! let consumer = TypeRef::new("java.util.function.Consumer");
//! let vivified = consumer.vivified();
//! assert!(vivified.is_vivified());
//! assert_eq!(vivified.name(), "$-vivified-$.java.util.function.Consumer");
//! assert_eq!(vivified.devivified(), Some(consumer));
//! ```

use std::{fmt, sync::Arc};

/// Source-name prefix of every vivified type.
pub const VIVIFIED_PREFIX: &str = "$-vivified-$.";

/// Name of the root class.
pub const OBJECT_TYPE: &str = "java.lang.Object";

/// Name of the exception thrown by invalid wrapper conversions.
pub const RUNTIME_EXCEPTION_TYPE: &str = "java.lang.RuntimeException";

/// Name of `java.lang.String`.
pub const STRING_TYPE: &str = "java.lang.String";

/// Name of the instance initializer.
pub const CONSTRUCTOR_NAME: &str = "<init>";

const PRIMITIVES: [&str; 9] = [
    "boolean", "byte", "char", "short", "int", "long", "float", "double", "void",
];

/// A reference to a type by name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRef(Arc<str>);

impl TypeRef {
    /// Creates a type reference from its source name.
    pub fn new(name: impl AsRef<str>) -> Self {
        TypeRef(Arc::from(name.as_ref()))
    }

    /// `java.lang.Object`
    #[must_use]
    pub fn object() -> Self {
        TypeRef::new(OBJECT_TYPE)
    }

    /// `void`
    #[must_use]
    pub fn void() -> Self {
        TypeRef::new("void")
    }

    /// The full source name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    /// The name after the last `.`.
    #[must_use]
    pub fn simple_name(&self) -> &str {
        match self.0.rfind('.') {
            Some(index) => &self.0[index + 1..],
            None => &self.0,
        }
    }

    /// The package (without trailing `.`), empty for the default package.
    #[must_use]
    pub fn package(&self) -> &str {
        match self.0.rfind('.') {
            Some(index) => &self.0[..index],
            None => "",
        }
    }

    /// True for `java.lang.Object`.
    #[must_use]
    pub fn is_object(&self) -> bool {
        &*self.0 == OBJECT_TYPE
    }

    /// True for `void`.
    #[must_use]
    pub fn is_void(&self) -> bool {
        &*self.0 == "void"
    }

    /// True for the eight primitive types and `void`.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        PRIMITIVES.contains(&&*self.0)
    }

    /// True for array types.
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.0.ends_with("[]")
    }

    /// True for class and interface types (neither primitive nor array).
    #[must_use]
    pub fn is_class_type(&self) -> bool {
        !self.is_primitive() && !self.is_array()
    }

    /// True if this is an engine-internal vivified type.
    #[must_use]
    pub fn is_vivified(&self) -> bool {
        self.0.starts_with(VIVIFIED_PREFIX)
    }

    /// The vivified mirror `V(T)` of this type.
    #[must_use]
    pub fn vivified(&self) -> TypeRef {
        TypeRef::new(format!("{VIVIFIED_PREFIX}{}", self.0))
    }

    /// For a vivified type, the library type it mirrors.
    #[must_use]
    pub fn devivified(&self) -> Option<TypeRef> {
        self.0.strip_prefix(VIVIFIED_PREFIX).map(TypeRef::new)
    }

    /// Returns this type with the leading `from` package prefix replaced by `to`.
    #[must_use]
    pub fn with_prefix_replaced(&self, from: &str, to: &str) -> Option<TypeRef> {
        self.0
            .strip_prefix(from)
            .map(|rest| TypeRef::new(format!("{to}{rest}")))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRef({})", self.0)
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        TypeRef::new(name)
    }
}

/// A method prototype: return type and ordered parameter types.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Proto {
    /// The declared return type
    pub return_type: TypeRef,
    /// The declared parameter types, receiver excluded
    pub parameters: Arc<[TypeRef]>,
}

impl Proto {
    /// Creates a new prototype.
    pub fn new(return_type: TypeRef, parameters: Vec<TypeRef>) -> Self {
        Proto {
            return_type,
            parameters: parameters.into(),
        }
    }

    /// Number of declared parameters.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Returns a prototype with `ty` inserted as the first parameter.
    #[must_use]
    pub fn prepend(&self, ty: TypeRef) -> Proto {
        let mut parameters = Vec::with_capacity(self.parameters.len() + 1);
        parameters.push(ty);
        parameters.extend(self.parameters.iter().cloned());
        Proto::new(self.return_type.clone(), parameters)
    }

    /// Iterates the return type followed by all parameter types.
    pub fn types(&self) -> impl Iterator<Item = &TypeRef> {
        std::iter::once(&self.return_type).chain(self.parameters.iter())
    }

    /// Applies `f` to every type of the prototype.
    #[must_use]
    pub fn map_types(&self, mut f: impl FnMut(&TypeRef) -> TypeRef) -> Proto {
        Proto::new(
            f(&self.return_type),
            self.parameters.iter().map(&mut f).collect(),
        )
    }
}

impl fmt::Display for Proto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (index, parameter) in self.parameters.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{parameter}")?;
        }
        write!(f, "){}", self.return_type)
    }
}

/// A reference to a method: holder, name and prototype.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct MethodRef {
    /// The class the reference is made against
    pub holder: TypeRef,
    /// The method name
    pub name: Arc<str>,
    /// The method prototype
    pub proto: Proto,
}

impl MethodRef {
    /// Creates a new method reference.
    pub fn new(holder: TypeRef, name: impl AsRef<str>, proto: Proto) -> Self {
        MethodRef {
            holder,
            name: Arc::from(name.as_ref()),
            proto,
        }
    }

    /// The method name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if name and prototype are equal, ignoring the holder.
    #[must_use]
    pub fn matches(&self, other: &MethodRef) -> bool {
        self.name == other.name && self.proto == other.proto
    }

    /// True for `<init>`.
    #[must_use]
    pub fn is_instance_initializer(&self) -> bool {
        &*self.name == CONSTRUCTOR_NAME
    }

    /// The same method on a different holder.
    #[must_use]
    pub fn with_holder(&self, holder: TypeRef) -> MethodRef {
        MethodRef {
            holder,
            name: self.name.clone(),
            proto: self.proto.clone(),
        }
    }

    /// The same method with a different prototype.
    #[must_use]
    pub fn with_proto(&self, proto: Proto) -> MethodRef {
        MethodRef {
            holder: self.holder.clone(),
            name: self.name.clone(),
            proto,
        }
    }

    /// `Holder#name`, the form used in diagnostics.
    #[must_use]
    pub fn short_name(&self) -> String {
        format!("{}#{}", self.holder, self.name)
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}{}", self.holder, self.name, self.proto)
    }
}

/// A reference to a field: holder, name and type.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct FieldRef {
    /// The class declaring the field
    pub holder: TypeRef,
    /// The field name
    pub name: Arc<str>,
    /// The field type
    pub ty: TypeRef,
}

impl FieldRef {
    /// Creates a new field reference.
    pub fn new(holder: TypeRef, name: impl AsRef<str>, ty: TypeRef) -> Self {
        FieldRef {
            holder,
            name: Arc::from(name.as_ref()),
            ty,
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}:{}", self.holder, self.name, self.ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_classification() {
        assert!(TypeRef::new("int").is_primitive());
        assert!(TypeRef::void().is_void());
        assert!(TypeRef::new("java.lang.String[]").is_array());
        assert!(TypeRef::object().is_object());
        assert!(TypeRef::new("java.util.Map").is_class_type());
        assert!(!TypeRef::new("java.util.Map[]").is_class_type());
    }

    #[test]
    fn names() {
        let ty = TypeRef::new("java.util.function.IntUnaryOperator");
        assert_eq!(ty.simple_name(), "IntUnaryOperator");
        assert_eq!(ty.package(), "java.util.function");
        assert_eq!(TypeRef::new("Foo").package(), "");
    }

    #[test]
    fn vivified_round_trip() {
        let ty = TypeRef::new("java.time.ZoneId");
        assert!(!ty.is_vivified());
        assert_eq!(ty.vivified().devivified(), Some(ty.clone()));
        assert_eq!(ty.devivified(), None);
    }

    #[test]
    fn prefix_replacement() {
        let ty = TypeRef::new("java.time.ZoneId");
        assert_eq!(
            ty.with_prefix_replaced("java.time.", "j$.time."),
            Some(TypeRef::new("j$.time.ZoneId"))
        );
        assert_eq!(ty.with_prefix_replaced("java.util.", "j$.util."), None);
    }

    #[test]
    fn proto_prepend_and_display() {
        let proto = Proto::new(TypeRef::void(), vec![TypeRef::new("int")]);
        let prepended = proto.prepend(TypeRef::new("java.util.Calendar"));
        assert_eq!(prepended.arity(), 2);
        assert_eq!(prepended.to_string(), "(java.util.Calendar, int)void");
        assert_eq!(proto.types().count(), 2);
    }

    #[test]
    fn method_matching_ignores_holder() {
        let proto = Proto::new(TypeRef::void(), vec![]);
        let a = MethodRef::new(TypeRef::new("a.A"), "run", proto.clone());
        let b = a.with_holder(TypeRef::new("b.B"));
        assert!(a.matches(&b));
        assert_ne!(a, b);
        assert_eq!(a.short_name(), "a.A#run");
        assert_eq!(a.to_string(), "a.A#run()void");
    }
}
