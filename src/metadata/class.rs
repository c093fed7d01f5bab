//! Class, method and field definitions.
//!
//! A [`ClassDef`] is one of three kinds. Program classes are compiled and emitted; classpath
//! classes are compiled against but not emitted; library classes describe the platform the
//! application runs on. Only program and classpath classes may carry code.

use crate::{
    ir::Code,
    metadata::{
        apilevel::AndroidApiLevel,
        flags::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags},
        types::{FieldRef, MethodRef, TypeRef},
    },
};

/// Origin of a class definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
pub enum ClassKind {
    /// Compiled and emitted
    Program,
    /// Referenced during compilation, provided at runtime by another artifact
    Classpath,
    /// Part of the platform
    Library,
}

/// A field declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    /// The field reference
    pub reference: FieldRef,
    /// Access flags
    pub flags: FieldAccessFlags,
}

impl FieldDef {
    /// Creates a new field declaration.
    pub fn new(reference: FieldRef, flags: FieldAccessFlags) -> Self {
        FieldDef { reference, flags }
    }
}

/// A method declaration, optionally with a body.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodDef {
    /// The method reference, holder being the declaring class
    pub reference: MethodRef,
    /// Access flags
    pub flags: MethodAccessFlags,
    /// Body, absent for abstract, native and library methods
    pub code: Option<Code>,
    /// API level the method was introduced at, if known
    pub api_level: Option<AndroidApiLevel>,
}

impl MethodDef {
    /// Creates a bodyless method declaration.
    pub fn new(reference: MethodRef, flags: MethodAccessFlags) -> Self {
        MethodDef {
            reference,
            flags,
            code: None,
            api_level: None,
        }
    }

    /// Attaches a body.
    #[must_use]
    pub fn with_code(mut self, code: Code) -> Self {
        self.code = Some(code);
        self
    }

    /// Records the introducing API level.
    #[must_use]
    pub fn with_api_level(mut self, level: AndroidApiLevel) -> Self {
        self.api_level = Some(level);
        self
    }

    /// The method name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.reference.name()
    }

    /// True for non-static, non-private methods other than constructors.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        !self.flags.is_static()
            && !self.flags.is_private()
            && !self.reference.is_instance_initializer()
    }

    /// True if declared static.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.is_static()
    }

    /// True if declared final.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.flags.is_final()
    }
}

/// A class or interface definition.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassDef {
    /// Program, classpath or library
    pub kind: ClassKind,
    /// The defined type
    pub ty: TypeRef,
    /// Access flags
    pub flags: ClassAccessFlags,
    /// Superclass, `None` only for `java.lang.Object`
    pub super_type: Option<TypeRef>,
    /// Directly implemented interfaces
    pub interfaces: Vec<TypeRef>,
    /// Declared fields
    pub fields: Vec<FieldDef>,
    /// Declared methods
    pub methods: Vec<MethodDef>,
}

impl ClassDef {
    /// Creates an empty class.
    pub fn new(
        kind: ClassKind,
        ty: TypeRef,
        flags: ClassAccessFlags,
        super_type: Option<TypeRef>,
    ) -> Self {
        ClassDef {
            kind,
            ty,
            flags,
            super_type,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Adds implemented interfaces.
    #[must_use]
    pub fn with_interfaces(mut self, interfaces: Vec<TypeRef>) -> Self {
        self.interfaces = interfaces;
        self
    }

    /// Adds a method. Returns `false` and leaves the class unchanged if a method with the same
    /// name and prototype is already declared.
    pub fn add_method(&mut self, method: MethodDef) -> bool {
        if self.lookup_method(&method.reference).is_some() {
            return false;
        }
        self.methods.push(method);
        true
    }

    /// Adds a field. Returns `false` if a field with the same name is already declared.
    pub fn add_field(&mut self, field: FieldDef) -> bool {
        if self
            .fields
            .iter()
            .any(|f| f.reference.name == field.reference.name)
        {
            return false;
        }
        self.fields.push(field);
        true
    }

    /// True for library classes.
    #[must_use]
    pub fn is_library(&self) -> bool {
        self.kind == ClassKind::Library
    }

    /// True for program classes.
    #[must_use]
    pub fn is_program(&self) -> bool {
        self.kind == ClassKind::Program
    }

    /// True for interfaces.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags.is_interface()
    }

    /// True for final classes.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.flags.is_final()
    }

    /// Looks up a declared method by name and prototype, ignoring the reference holder.
    #[must_use]
    pub fn lookup_method(&self, method: &MethodRef) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.reference.matches(method))
    }

    /// Like [`ClassDef::lookup_method`] but only returns virtual methods.
    #[must_use]
    pub fn lookup_virtual_method(&self, method: &MethodRef) -> Option<&MethodDef> {
        self.lookup_method(method).filter(|m| m.is_virtual())
    }

    /// All declared methods with the given name.
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodDef> {
        self.methods.iter().filter(move |m| m.name() == name)
    }

    /// All declared virtual methods.
    pub fn virtual_methods(&self) -> impl Iterator<Item = &MethodDef> {
        self.methods.iter().filter(|m| m.is_virtual())
    }

    /// The direct supertypes: superclass first, then interfaces.
    pub fn supertypes(&self) -> impl Iterator<Item = &TypeRef> {
        self.super_type.iter().chain(self.interfaces.iter())
    }
}
