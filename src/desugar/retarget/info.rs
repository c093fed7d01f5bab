//! The retargeting tables, computed once per compilation.
//!
//! [`RetargetingInfo::compute`] turns the `retarget_core_library_member` entries of the
//! specification into three lookups:
//!
//! - **configured targets**: every found library member mapped to its static destination,
//!   with the original holder prepended for instance members
//! - **non-final holder index**: member name to the members of non-final holders, used to
//!   force resolution when the static receiver type does not determine the target
//! - **emulated dispatch set**: overridable instance members, reached through a synthesized
//!   dispatch holder instead of their static destination
//!
//! The tables are immutable once computed.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use tracing::debug;

use crate::{
    desugar::specification::DesugaredLibrarySpecification,
    metadata::{
        app::AppView,
        class::{ClassDef, MethodDef},
        types::{MethodRef, Proto, TypeRef},
    },
};

/// Where a retargeted call goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetargetTarget {
    /// A static method, called with the receiver as first argument.
    Static(MethodRef),
    /// The dispatch holder of this emulated-dispatch member.
    EmulatedDispatch(MethodRef),
}

/// The retargeting tables of one compilation.
#[derive(Debug, Clone, Default)]
pub struct RetargetingInfo {
    configured: BTreeMap<MethodRef, MethodRef>,
    non_final_holder_rewrites: BTreeMap<String, Vec<MethodRef>>,
    emulated_dispatch: BTreeSet<MethodRef>,
    backports: BTreeMap<TypeRef, TypeRef>,
}

impl RetargetingInfo {
    /// Builds the tables from the specification and the library classes of `app`.
    ///
    /// Entries whose holder class is missing, or which name no member of it, are skipped; the
    /// pre-pass in [`crate::desugar::retarget::library`] reports them.
    #[must_use]
    pub fn compute(app: &AppView, spec: &DesugaredLibrarySpecification) -> Self {
        let mut info = RetargetingInfo {
            backports: spec.backport_core_library_member.clone(),
            ..Default::default()
        };

        for (name, holders) in &spec.retarget_core_library_member {
            for (from, to) in holders {
                let Some(class) = app.definition_for(from) else {
                    continue;
                };
                for method in class.methods_named(name) {
                    info.add_member(app, spec, class, method, to);
                }
            }
        }

        if spec.library_compilation {
            info.add_legacy_retargets();
        }

        debug!(
            configured = info.configured.len(),
            emulated = info.emulated_dispatch.len(),
            "computed retargeting tables"
        );
        info
    }

    fn add_member(
        &mut self,
        app: &AppView,
        spec: &DesugaredLibrarySpecification,
        class: &ClassDef,
        method: &MethodDef,
        new_holder: &TypeRef,
    ) {
        let reference = &method.reference;
        if !class.is_final() {
            self.non_final_holder_rewrites
                .entry(method.name().to_string())
                .or_default()
                .push(reference.clone());
            if !method.is_static() {
                if is_emulated_interface_dispatch(app, spec, class, reference) {
                    return;
                }
                if !method.is_final() {
                    self.emulated_dispatch.insert(reference.clone());
                }
            }
        }
        self.configured
            .insert(reference.clone(), retarget_method(method, new_holder));
    }

    fn add_legacy_retargets(&mut self) {
        let deep_equals = MethodRef::new(
            TypeRef::new("java.util.Arrays"),
            "deepEquals0",
            Proto::new(
                TypeRef::new("boolean"),
                vec![TypeRef::object(), TypeRef::object()],
            ),
        );
        self.configured.insert(
            deep_equals.clone(),
            deep_equals.with_holder(TypeRef::new("java.util.DesugarArrays")),
        );

        let get_time_zone = MethodRef::new(
            TypeRef::new("java.util.TimeZone"),
            "getTimeZone",
            Proto::new(
                TypeRef::new("java.util.TimeZone"),
                vec![TypeRef::new("java.time.ZoneId")],
            ),
        );
        self.configured.insert(
            get_time_zone.clone(),
            get_time_zone.with_holder(TypeRef::new("java.util.DesugarTimeZone")),
        );
    }

    /// True if nothing is retargeted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configured.is_empty() && self.backports.is_empty()
    }

    /// Looks up `method` verbatim: backported holders first, then the retarget table.
    #[must_use]
    pub fn lookup(&self, method: &MethodRef) -> Option<RetargetTarget> {
        if let Some(new_holder) = self.backports.get(&method.holder) {
            return Some(RetargetTarget::Static(method.with_holder(new_holder.clone())));
        }
        if self.emulated_dispatch.contains(method) {
            return Some(RetargetTarget::EmulatedDispatch(method.clone()));
        }
        self.configured
            .get(method)
            .map(|target| RetargetTarget::Static(target.clone()))
    }

    /// The direct static destination of `method`, `None` for emulated-dispatch members.
    #[must_use]
    pub fn direct_target(&self, method: &MethodRef) -> Option<&MethodRef> {
        if self.emulated_dispatch.contains(method) {
            return None;
        }
        self.configured.get(method)
    }

    /// The configured static destination of `method`, whether or not it is dispatched.
    #[must_use]
    pub fn configured_target(&self, method: &MethodRef) -> Option<&MethodRef> {
        self.configured.get(method)
    }

    /// True if a member of a non-final holder has the name and prototype of `method`.
    #[must_use]
    pub fn matches_non_final_holder_rewrite(&self, method: &MethodRef) -> bool {
        self.non_final_holder_rewrites
            .get(method.name())
            .is_some_and(|candidates| candidates.iter().any(|c| c.matches(method)))
    }

    /// True if calls to `method` go through emulated dispatch.
    #[must_use]
    pub fn is_emulated_dispatch(&self, method: &MethodRef) -> bool {
        self.emulated_dispatch.contains(method)
    }

    /// Every configured `source -> destination` pair in source order.
    pub fn configured_targets(&self) -> impl Iterator<Item = (&MethodRef, &MethodRef)> {
        self.configured.iter()
    }

    /// The emulated-dispatch members in reference order.
    pub fn emulated_dispatch_methods(&self) -> impl Iterator<Item = &MethodRef> {
        self.emulated_dispatch.iter()
    }
}

/// The static destination of `method` on `new_holder`.
fn retarget_method(method: &MethodDef, new_holder: &TypeRef) -> MethodRef {
    let reference = &method.reference;
    let proto = if method.is_static() {
        reference.proto.clone()
    } else {
        reference.proto.prepend(reference.holder.clone())
    };
    MethodRef::new(new_holder.clone(), reference.name(), proto)
}

/// True if an emulated interface among the supertypes of `class` declares `method`.
fn is_emulated_interface_dispatch(
    app: &AppView,
    spec: &DesugaredLibrarySpecification,
    class: &ClassDef,
    method: &MethodRef,
) -> bool {
    if spec.emulate_interface.is_empty() {
        return false;
    }
    let mut seen: HashSet<&TypeRef> = HashSet::new();
    let mut worklist: VecDeque<&ClassDef> = VecDeque::from([class]);
    while let Some(current) = worklist.pop_front() {
        if current.is_interface()
            && spec.is_emulated_interface(&current.ty)
            && current.lookup_method(method).is_some()
        {
            return true;
        }
        for super_type in current.supertypes() {
            if seen.insert(super_type) {
                if let Some(super_class) = app.definition_for(super_type) {
                    worklist.push_back(super_class);
                }
            }
        }
    }
    false
}
