//! Shared state of one desugaring run.
//!
//! The [`DesugarContext`] is created once per run and borrowed by every component. All of its
//! mutable parts are concurrent containers, so the parallel method sweep can share a single
//! `&DesugarContext` between worker threads.

use std::sync::Arc;

use crate::{
    desugar::{
        events::SynthesisQueue, options::DesugarOptions,
        specification::DesugaredLibrarySpecification, synthetic::SyntheticItems,
    },
    metadata::{
        diagnostics::Diagnostics,
        rewriter::{PrefixTypeRewriter, TypeRewriter},
        types::{MethodRef, Proto, TypeRef},
    },
};

/// Shared state of one desugaring run.
pub struct DesugarContext {
    /// The selected specification tables.
    pub spec: DesugaredLibrarySpecification,

    /// Engine configuration.
    pub options: DesugarOptions,

    /// The type-rewrite oracle, built from the specification's prefixes.
    ///
    /// Synthesis registers additional mappings here as it creates types.
    pub rewriter: PrefixTypeRewriter,

    /// Every type synthesized during the run.
    pub synthetics: SyntheticItems,

    /// Finished artifacts waiting to be attached to the app.
    pub queue: SynthesisQueue,

    /// Diagnostics reported during the run.
    pub diagnostics: Arc<Diagnostics>,
}

impl DesugarContext {
    /// Creates the context of a run.
    #[must_use]
    pub fn new(spec: DesugaredLibrarySpecification, options: DesugarOptions) -> Self {
        let rewriter = spec.type_rewriter();
        DesugarContext {
            spec,
            options,
            rewriter,
            synthetics: SyntheticItems::new(),
            queue: SynthesisQueue::new(),
            diagnostics: Arc::new(Diagnostics::new()),
        }
    }

    /// True when compiling the desugared library itself.
    #[must_use]
    pub fn is_library_compilation(&self) -> bool {
        self.spec.library_compilation
    }

    /// Package prefix of classes synthesized for the desugared library.
    #[must_use]
    pub fn synthesized_prefix(&self) -> &str {
        &self.spec.synthesized_library_classes_package_prefix
    }

    /// True if `ty` has a desugared counterpart.
    #[must_use]
    pub fn is_rewritten(&self, ty: &TypeRef) -> bool {
        !ty.is_vivified() && self.rewriter.has_rewritten_type(ty)
    }

    /// `V(ty)`, registered with the oracle as mapping back to `ty`.
    pub fn vivified_type(&self, ty: &TypeRef) -> TypeRef {
        let vivified = ty.vivified();
        self.rewriter.rewrite_type(vivified.clone(), ty.clone());
        vivified
    }

    /// `proto` with every rewritten type replaced by its vivified mirror.
    pub fn vivified_proto(&self, proto: &Proto) -> Proto {
        proto.map_types(|ty| {
            if self.is_rewritten(ty) {
                self.vivified_type(ty)
            } else {
                ty.clone()
            }
        })
    }

    /// `method` moved to `holder` with a vivified prototype.
    pub fn vivified_method(&self, method: &MethodRef, holder: TypeRef) -> MethodRef {
        MethodRef::new(holder, method.name(), self.vivified_proto(&method.proto))
    }
}
