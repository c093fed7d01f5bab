//! Synthetic type naming and the registry of synthesized types.
//!
//! Every type the engine fabricates is named deterministically from the type or method it is
//! derived from, and recorded in [`SyntheticItems`] with its [`SyntheticKind`]. Later stages
//! consult the registry instead of decoding names, e.g. to skip conversion of invokes made from
//! inside conversion code.
//!
//! | Kind | Name |
//! |---|---|
//! | [`SyntheticKind::Wrapper`] | `{T}$-WRP` |
//! | [`SyntheticKind::VivifiedWrapper`] | `{T}$-V-WRP` |
//! | [`SyntheticKind::ApiConversionOutline`] | `{Context}$$ExternalSyntheticApiConversion${method}${index}${n}` |
//! | [`SyntheticKind::RetargetInterface`] | `{prefix}retarget.$r8$retargetLibraryMember$virtualDispatch${Holder}${method}$dispatchInterface` |
//! | [`SyntheticKind::RetargetHolder`] | same, ending in `$dispatchHolder` |

use crossbeam_skiplist::SkipMap;

use crate::metadata::types::{MethodRef, TypeRef};

/// Name of the field holding the wrapped value.
pub const WRAPPER_FIELD_NAME: &str = "wrappedValue";

/// Name of the static conversion method on wrappers and custom conversion holders.
pub const CONVERT_METHOD_NAME: &str = "convert";

/// Name of the static method on per-call-site outline classes.
pub const OUTLINE_METHOD_NAME: &str = "apiConversionCall";

/// Name prefix of super-call outlines installed on the calling class.
pub const SUPER_OUTLINE_PREFIX: &str = "$api$convert$super$";

const WRAPPER_SUFFIX: &str = "$-WRP";
const VIVIFIED_WRAPPER_SUFFIX: &str = "$-V-WRP";
const OUTLINE_INFIX: &str = "$$ExternalSyntheticApiConversion$";
const DISPATCH_PREFIX: &str = "retarget.$r8$retargetLibraryMember$virtualDispatch$";

/// Kinds of synthesized types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum SyntheticKind {
    /// Wraps a desugared value as the platform type
    Wrapper,
    /// Wraps a platform value as the desugared type
    VivifiedWrapper,
    /// Outlined conversion of one call site
    ApiConversionOutline,
    /// Emulated dispatch interface
    RetargetInterface,
    /// Emulated dispatch holder
    RetargetHolder,
    /// Placeholder for a missing custom conversion holder
    CustomConversionPlaceholder,
    /// Fabricated retarget destination library class
    LibraryType,
}

impl SyntheticKind {
    /// True for kinds whose code performs conversions itself and must not be converted again.
    #[must_use]
    pub fn is_api_conversion(self) -> bool {
        matches!(
            self,
            Self::Wrapper
                | Self::VivifiedWrapper
                | Self::ApiConversionOutline
                | Self::CustomConversionPlaceholder
        )
    }
}

fn sanitize(name: &str) -> String {
    name.replace(['<', '>'], "$")
}

/// The wrapper presenting a desugared `ty` as the platform type.
#[must_use]
pub fn wrapper_type(ty: &TypeRef) -> TypeRef {
    TypeRef::new(format!("{ty}{WRAPPER_SUFFIX}"))
}

/// The wrapper presenting a platform `ty` as the desugared type.
#[must_use]
pub fn vivified_wrapper_type(ty: &TypeRef) -> TypeRef {
    TypeRef::new(format!("{ty}{VIVIFIED_WRAPPER_SUFFIX}"))
}

/// The outline class for the `counter`-th converted call site of `context`.
///
/// `index` is the position of `context` among the methods of its holder, so overloads sharing
/// a name get distinct outlines.
#[must_use]
pub fn outline_type(context: &MethodRef, index: usize, counter: usize) -> TypeRef {
    TypeRef::new(format!(
        "{}{OUTLINE_INFIX}{}${index}${counter}",
        context.holder,
        sanitize(context.name())
    ))
}

/// The name of the super-call outline for `method`.
#[must_use]
pub fn super_outline_name(method: &MethodRef) -> String {
    format!("{SUPER_OUTLINE_PREFIX}{}", sanitize(method.name()))
}

fn dispatch_type(prefix: &str, method: &MethodRef, suffix: &str) -> TypeRef {
    TypeRef::new(format!(
        "{prefix}{DISPATCH_PREFIX}{}${}${suffix}",
        method.holder.simple_name(),
        method.name()
    ))
}

/// The emulated dispatch interface of `method`.
#[must_use]
pub fn dispatch_interface_type(prefix: &str, method: &MethodRef) -> TypeRef {
    dispatch_type(prefix, method, "dispatchInterface")
}

/// The emulated dispatch holder of `method`.
#[must_use]
pub fn dispatch_holder_type(prefix: &str, method: &MethodRef) -> TypeRef {
    dispatch_type(prefix, method, "dispatchHolder")
}

/// Ordered, concurrent registry of every synthesized type.
pub struct SyntheticItems {
    items: SkipMap<TypeRef, SyntheticKind>,
}

impl Default for SyntheticItems {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticItems {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: SkipMap::new(),
        }
    }

    /// Records `ty` as synthesized. The first registration of a type wins.
    ///
    /// Returns `false` if `ty` was already registered.
    pub fn register(&self, ty: TypeRef, kind: SyntheticKind) -> bool {
        if self.items.contains_key(&ty) {
            return false;
        }
        let entry = self.items.get_or_insert(ty, kind);
        *entry.value() == kind
    }

    /// The kind of a synthesized type.
    #[must_use]
    pub fn kind_of(&self, ty: &TypeRef) -> Option<SyntheticKind> {
        self.items.get(ty).map(|entry| *entry.value())
    }

    /// True if code inside `ty` must not be converted again.
    #[must_use]
    pub fn is_api_conversion_type(&self, ty: &TypeRef) -> bool {
        self.kind_of(ty).is_some_and(SyntheticKind::is_api_conversion)
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Registered types of `kind`, in type order.
    #[must_use]
    pub fn of_kind(&self, kind: SyntheticKind) -> Vec<TypeRef> {
        self.items
            .iter()
            .filter(|entry| *entry.value() == kind)
            .map(|entry| entry.key().clone())
            .collect()
    }
}

impl std::fmt::Debug for SyntheticItems {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.items.iter().map(|e| (e.key().clone(), *e.value())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::types::Proto;

    fn foo() -> MethodRef {
        MethodRef::new(
            TypeRef::new("java.util.Calendar"),
            "toInstant",
            Proto::new(TypeRef::new("java.time.Instant"), vec![]),
        )
    }

    #[test]
    fn naming() {
        let consumer = TypeRef::new("java.util.function.Consumer");
        assert_eq!(
            wrapper_type(&consumer).name(),
            "java.util.function.Consumer$-WRP"
        );
        assert_eq!(
            vivified_wrapper_type(&consumer).name(),
            "java.util.function.Consumer$-V-WRP"
        );
        assert_eq!(
            dispatch_holder_type("j$.", &foo()).name(),
            "j$.retarget.$r8$retargetLibraryMember$virtualDispatch$Calendar$toInstant$dispatchHolder"
        );
        assert!(dispatch_interface_type("j$.", &foo())
            .name()
            .ends_with("$dispatchInterface"));

        let init = MethodRef::new(
            TypeRef::new("app.Main"),
            "<init>",
            Proto::new(TypeRef::void(), vec![]),
        );
        assert_eq!(
            outline_type(&init, 0, 2).name(),
            "app.Main$$ExternalSyntheticApiConversion$$init$$0$2"
        );
        let run = MethodRef::new(
            TypeRef::new("app.Main"),
            "run",
            Proto::new(TypeRef::void(), vec![TypeRef::new("int")]),
        );
        assert_ne!(outline_type(&run, 1, 0), outline_type(&run, 2, 0));
        assert_eq!(super_outline_name(&foo()), "$api$convert$super$toInstant");
    }

    #[test]
    fn registry_first_registration_wins() {
        let items = SyntheticItems::new();
        let ty = TypeRef::new("a.B$-WRP");
        assert!(items.register(ty.clone(), SyntheticKind::Wrapper));
        assert!(!items.register(ty.clone(), SyntheticKind::RetargetHolder));
        assert_eq!(items.kind_of(&ty), Some(SyntheticKind::Wrapper));
        assert!(items.is_api_conversion_type(&ty));

        let holder = TypeRef::new("j$.retarget.Holder");
        items.register(holder.clone(), SyntheticKind::RetargetHolder);
        assert!(!items.is_api_conversion_type(&holder));
        assert_eq!(items.of_kind(SyntheticKind::RetargetHolder), vec![holder]);
        assert_eq!(items.len(), 2);
    }
}
