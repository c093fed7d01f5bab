//! The class graph of a compilation and its hierarchy queries.
//!
//! [`AppView`] holds every program, classpath and library class known to the compilation and
//! answers the lookups the desugaring engine performs: definitions, method resolution, super
//! target lookup and supertype closure walks.
//!
//! Classes are kept in a `BTreeMap` keyed by type so that every iteration over the graph (and
//! therefore every synthesized artifact and diagnostic derived from it) is deterministic.
//!
//! # Example
//!
//! ```rust
//! use vivify::metadata::{
//!     app::AppView,
//!     class::{ClassDef, ClassKind, MethodDef},
//!     flags::{ClassAccessFlags, MethodAccessFlags},
//!     types::{MethodRef, Proto, TypeRef},
//! };
//!
//! let mut app = AppView::new();
//! let mut list = ClassDef::new(
//!     ClassKind::Library,
//!     TypeRef::new("java.util.List"),
//!     ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT,
//!     Some(TypeRef::object()),
//! );
//! let size = MethodRef::new(
//!     TypeRef::new("java.util.List"),
//!     "size",
//!     Proto::new(TypeRef::new("int"), vec![]),
//! );
//! list.add_method(MethodDef::new(
//!     size.clone(),
//!     MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
//! ));
//! app.add_class(list);
//!
//! let resolved = app.resolve_method(&size).expect("resolves");
//! assert_eq!(resolved.holder.ty, TypeRef::new("java.util.List"));
//! ```

use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::metadata::{
    class::{ClassDef, ClassKind, MethodDef},
    types::{MethodRef, TypeRef},
};

/// A method definition together with the class declaring it.
#[derive(Clone, Copy, Debug)]
pub struct ResolvedMethod<'a> {
    /// The declaring class
    pub holder: &'a ClassDef,
    /// The method definition
    pub method: &'a MethodDef,
}

impl<'a> ResolvedMethod<'a> {
    /// The reference of the resolved definition, holder being the declaring class.
    #[must_use]
    pub fn reference(&self) -> &'a MethodRef {
        &self.method.reference
    }
}

/// The class graph of one compilation.
#[derive(Clone, Debug, Default)]
pub struct AppView {
    classes: BTreeMap<TypeRef, ClassDef>,
}

impl AppView {
    /// Creates an empty class graph.
    #[must_use]
    pub fn new() -> Self {
        AppView {
            classes: BTreeMap::new(),
        }
    }

    /// Adds or replaces a class. Returns the replaced definition.
    pub fn add_class(&mut self, class: ClassDef) -> Option<ClassDef> {
        self.classes.insert(class.ty.clone(), class)
    }

    /// Removes a class.
    pub fn remove_class(&mut self, ty: &TypeRef) -> Option<ClassDef> {
        self.classes.remove(ty)
    }

    /// Looks up a class definition.
    #[must_use]
    pub fn definition_for(&self, ty: &TypeRef) -> Option<&ClassDef> {
        self.classes.get(ty)
    }

    /// Looks up a class definition for modification.
    pub fn definition_for_mut(&mut self, ty: &TypeRef) -> Option<&mut ClassDef> {
        self.classes.get_mut(ty)
    }

    /// True if `ty` is defined as a library class.
    #[must_use]
    pub fn is_library_class(&self, ty: &TypeRef) -> bool {
        self.definition_for(ty).is_some_and(ClassDef::is_library)
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// True if no class is defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// All classes in type order.
    pub fn classes(&self) -> impl Iterator<Item = &ClassDef> {
        self.classes.values()
    }

    /// All classes in type order, mutable.
    pub fn classes_mut(&mut self) -> impl Iterator<Item = &mut ClassDef> {
        self.classes.values_mut()
    }

    /// All program classes in type order.
    pub fn program_classes(&self) -> impl Iterator<Item = &ClassDef> {
        self.classes.values().filter(|c| c.kind == ClassKind::Program)
    }

    /// Walks the supertypes of `ty` breadth first, superclass before interfaces, without
    /// visiting any type twice. `ty` itself is not visited; undefined types are skipped.
    #[must_use]
    pub fn supertype_closure(&self, ty: &TypeRef) -> Vec<&ClassDef> {
        let mut result = Vec::new();
        let mut seen: HashSet<&TypeRef> = HashSet::new();
        let mut worklist: VecDeque<&TypeRef> = VecDeque::new();

        if let Some(class) = self.definition_for(ty) {
            seen.insert(&class.ty);
            worklist.extend(class.supertypes());
        }
        while let Some(next) = worklist.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            if let Some(class) = self.definition_for(next) {
                result.push(class);
                worklist.extend(class.supertypes());
            }
        }
        result
    }

    /// Resolves a method reference the way the JVM does: the holder and its superclasses
    /// first, then the superinterfaces (non-abstract declarations preferred).
    ///
    /// # Arguments
    ///
    /// * `method` - The symbolic reference
    ///
    /// # Returns
    ///
    /// The declaring class and definition, or `None` if the holder is undefined or no
    /// declaration matches.
    #[must_use]
    pub fn resolve_method(&self, method: &MethodRef) -> Option<ResolvedMethod<'_>> {
        let holder = self.definition_for(&method.holder)?;
        self.resolve_from(holder, method)
    }

    fn resolve_from<'a>(
        &'a self,
        start: &'a ClassDef,
        method: &MethodRef,
    ) -> Option<ResolvedMethod<'a>> {
        let mut current = Some(start);
        while let Some(class) = current {
            if let Some(found) = class.lookup_method(method) {
                return Some(ResolvedMethod {
                    holder: class,
                    method: found,
                });
            }
            current = class
                .super_type
                .as_ref()
                .and_then(|s| self.definition_for(s));
        }

        let mut abstract_candidate = None;
        for class in self.supertype_closure(&start.ty) {
            if !class.is_interface() {
                continue;
            }
            if let Some(found) = class.lookup_method(method) {
                if found.is_static() || found.flags.is_private() {
                    continue;
                }
                let resolved = ResolvedMethod {
                    holder: class,
                    method: found,
                };
                if !found.flags.is_abstract() {
                    return Some(resolved);
                }
                abstract_candidate.get_or_insert(resolved);
            }
        }
        abstract_candidate
    }

    /// Looks up the target of an `invoke-super` of `method` from within `context`.
    ///
    /// For interface holders (default method super calls) resolution starts at the named
    /// interface, otherwise at the superclass of the context.
    #[must_use]
    pub fn lookup_super_target(
        &self,
        method: &MethodRef,
        context: &TypeRef,
    ) -> Option<ResolvedMethod<'_>> {
        let named = self.definition_for(&method.holder)?;
        if named.is_interface() {
            return self.resolve_from(named, method);
        }
        let context_class = self.definition_for(context)?;
        let super_class = self.definition_for(context_class.super_type.as_ref()?)?;
        self.resolve_from(super_class, method)
    }

    /// True if `method`, declared on `holder`, overrides a virtual method declared by a
    /// library supertype.
    #[must_use]
    pub fn is_library_method_override(&self, holder: &TypeRef, method: &MethodRef) -> bool {
        self.supertype_closure(holder)
            .iter()
            .any(|class| class.is_library() && class.lookup_virtual_method(method).is_some())
    }

    /// True if `ty` is `ancestor` or transitively extends or implements it.
    #[must_use]
    pub fn is_subtype_of(&self, ty: &TypeRef, ancestor: &TypeRef) -> bool {
        ty == ancestor
            || self
                .supertype_closure(ty)
                .iter()
                .any(|class| &class.ty == ancestor)
    }
}
