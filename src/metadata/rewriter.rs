//! The type-rewrite oracle.
//!
//! The oracle decides which library types have a desugared counterpart inside the application
//! (`T -> T'`). The desugaring engine only consults it through [`TypeRewriter`]; the
//! policy of *which* types are rewritten lives in the desugared library specification.
//!
//! [`PrefixTypeRewriter`] is the package-prefix based oracle used by desugared library builds:
//! every type below a configured package prefix is renamed into the replacement package. The
//! engine registers additional one-off mappings through [`TypeRewriter::rewrite_type`] while it
//! synthesizes types (vivified types map back to their library type, dispatch classes map to
//! themselves), so registrations go into a concurrent map and may happen from worker threads.
//!
//! ```rust
//! use vivify::metadata::rewriter::{PrefixTypeRewriter, TypeRewriter};
//! use vivify::metadata::types::TypeRef;
//!
//! let rewriter = PrefixTypeRewriter::new([("java.time.", "j$.time.")], ["java.time.chrono."]);
//! let zone = TypeRef::new("java.time.ZoneId");
//! assert_eq!(rewriter.rewritten_type(&zone), Some(TypeRef::new("j$.time.ZoneId")));
//! assert!(!rewriter.has_rewritten_type(&TypeRef::new("java.time.chrono.Era")));
//!
//! rewriter.rewrite_type(zone.vivified(), zone.clone());
//! assert_eq!(rewriter.rewritten_type(&zone.vivified()), Some(zone));
//! ```

use dashmap::DashMap;

use crate::metadata::types::{Proto, TypeRef};

/// Read and registration access to the type-rewrite oracle.
pub trait TypeRewriter: Send + Sync {
    /// True if `ty` is renamed in the output.
    fn has_rewritten_type(&self, ty: &TypeRef) -> bool {
        self.rewritten_type(ty).is_some()
    }

    /// The output name of `ty`, `None` if it is not rewritten.
    fn rewritten_type(&self, ty: &TypeRef) -> Option<TypeRef>;

    /// True if any parameter or the return type of `proto` is rewritten.
    fn has_rewritten_type_in_signature(&self, proto: &Proto) -> bool {
        proto.types().any(|ty| self.has_rewritten_type(ty))
    }

    /// Registers an additional mapping `from -> to`.
    fn rewrite_type(&self, from: TypeRef, to: TypeRef);
}

/// Package-prefix based oracle with runtime registrations.
#[derive(Debug, Default)]
pub struct PrefixTypeRewriter {
    /// `(prefix, replacement)`, longest prefix first
    prefixes: Vec<(String, String)>,
    /// Prefixes excluded from rewriting
    dont_rewrite: Vec<String>,
    /// Explicit mappings, consulted before the prefixes
    registered: DashMap<TypeRef, TypeRef>,
}

impl PrefixTypeRewriter {
    /// Creates an oracle from `(prefix, replacement)` pairs and excluded prefixes.
    pub fn new<P, R, D>(
        prefixes: impl IntoIterator<Item = (P, R)>,
        dont_rewrite: impl IntoIterator<Item = D>,
    ) -> Self
    where
        P: Into<String>,
        R: Into<String>,
        D: Into<String>,
    {
        let mut prefixes: Vec<(String, String)> = prefixes
            .into_iter()
            .map(|(p, r)| (p.into(), r.into()))
            .collect();
        prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        PrefixTypeRewriter {
            prefixes,
            dont_rewrite: dont_rewrite.into_iter().map(Into::into).collect(),
            registered: DashMap::new(),
        }
    }

    /// Number of runtime registrations.
    #[must_use]
    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }

    fn rewrite_base(&self, ty: &TypeRef) -> Option<TypeRef> {
        if let Some(registered) = self.registered.get(ty) {
            return Some(registered.value().clone());
        }
        if ty.is_vivified() || !ty.is_class_type() {
            return None;
        }
        if self
            .dont_rewrite
            .iter()
            .any(|prefix| ty.name().starts_with(prefix.as_str()))
        {
            return None;
        }
        self.prefixes
            .iter()
            .find_map(|(prefix, replacement)| ty.with_prefix_replaced(prefix, replacement))
    }
}

impl TypeRewriter for PrefixTypeRewriter {
    fn rewritten_type(&self, ty: &TypeRef) -> Option<TypeRef> {
        let name = ty.name();
        let base = name.trim_end_matches("[]");
        if base.len() == name.len() {
            return self.rewrite_base(ty);
        }
        let dimensions = &name[base.len()..];
        self.rewrite_base(&TypeRef::new(base))
            .map(|rewritten| TypeRef::new(format!("{rewritten}{dimensions}")))
    }

    fn rewrite_type(&self, from: TypeRef, to: TypeRef) {
        self.registered.entry(from).or_insert(to);
    }
}
