//! Deferred attachment of synthesized artifacts.
//!
//! Synthesis routines never touch the live class graph. Each finished artifact is described by
//! a [`SynthesisEvent`] and pushed onto the [`SynthesisQueue`], which is safe to share between
//! worker threads. Once the parallel sweep is over, a single coordinating phase drains the queue
//! in a deterministic order into a [`SynthesisEventConsumer`], normally the
//! [`crate::metadata::app::AppView`] being compiled.
//!
//! # Example
//!
//! ```rust
//! use vivify::desugar::events::{SynthesisEvent, SynthesisEventKind, SynthesisQueue};
//! use vivify::metadata::types::TypeRef;
//!
//! let mut queue = SynthesisQueue::new();
//! queue.push(SynthesisEvent::ExtraInterface {
//!     holder: TypeRef::new("app.MyList"),
//!     interface: TypeRef::new("j$.retarget.Dispatch"),
//! });
//! assert_eq!(queue.count(SynthesisEventKind::ExtraInterface), 1);
//!
//! let mut received = Vec::new();
//! let counts = queue.drain_into(&mut received)?;
//! assert_eq!(received.len(), 1);
//! assert_eq!(counts.total(), 1);
//! # Ok::<(), vivify::Error>(())
//! ```

use std::{collections::BTreeMap, fmt};

use tracing::trace;

use crate::{
    metadata::{
        app::AppView,
        class::{ClassDef, MethodDef},
        types::{MethodRef, TypeRef},
    },
    Error, Result,
};

/// Kinds of synthesized artifacts, in commit order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SynthesisEventKind {
    /// Wrapper class emitted with the library build
    WrapperProgramClass,
    /// Wrapper class provided by the desugared library at runtime
    WrapperClasspathClass,
    /// Per-call-site conversion outline class
    ApiConversionOutline,
    /// Super-call conversion outline method on the calling class
    ApiConversionSuperOutline,
    /// Vivified-signature callback method on a program class
    CallbackMethod,
    /// Emulated dispatch class emitted with the library build
    RetargetDispatchProgramClass,
    /// Emulated dispatch class provided by the desugared library at runtime
    RetargetDispatchClasspathClass,
    /// Forwarding method installed on an emulated-dispatch implementor
    ForwardingMethod,
    /// Dispatch interface added to an emulated-dispatch implementor
    ExtraInterface,
}

/// A finished synthesized artifact waiting to be attached.
#[derive(Debug, Clone)]
pub enum SynthesisEvent {
    /// See [`SynthesisEventKind::WrapperProgramClass`]
    WrapperProgramClass(ClassDef),
    /// See [`SynthesisEventKind::WrapperClasspathClass`]
    WrapperClasspathClass(ClassDef),
    /// See [`SynthesisEventKind::ApiConversionOutline`]
    ApiConversionOutline(ClassDef),
    /// See [`SynthesisEventKind::ApiConversionSuperOutline`]
    ApiConversionSuperOutline {
        /// The class making the super call
        holder: TypeRef,
        /// The outline
        method: MethodDef,
    },
    /// See [`SynthesisEventKind::CallbackMethod`]
    CallbackMethod {
        /// The program class declaring the override
        holder: TypeRef,
        /// The callback
        method: MethodDef,
    },
    /// See [`SynthesisEventKind::RetargetDispatchProgramClass`]
    RetargetDispatchProgramClass(ClassDef),
    /// See [`SynthesisEventKind::RetargetDispatchClasspathClass`]
    RetargetDispatchClasspathClass(ClassDef),
    /// See [`SynthesisEventKind::ForwardingMethod`]
    ForwardingMethod {
        /// The implementor receiving the method
        holder: TypeRef,
        /// The forwarding method
        method: MethodDef,
    },
    /// See [`SynthesisEventKind::ExtraInterface`]
    ExtraInterface {
        /// The implementor
        holder: TypeRef,
        /// The dispatch interface
        interface: TypeRef,
    },
}

impl SynthesisEvent {
    /// The kind of this event.
    #[must_use]
    pub fn kind(&self) -> SynthesisEventKind {
        match self {
            Self::WrapperProgramClass(_) => SynthesisEventKind::WrapperProgramClass,
            Self::WrapperClasspathClass(_) => SynthesisEventKind::WrapperClasspathClass,
            Self::ApiConversionOutline(_) => SynthesisEventKind::ApiConversionOutline,
            Self::ApiConversionSuperOutline { .. } => {
                SynthesisEventKind::ApiConversionSuperOutline
            }
            Self::CallbackMethod { .. } => SynthesisEventKind::CallbackMethod,
            Self::RetargetDispatchProgramClass(_) => {
                SynthesisEventKind::RetargetDispatchProgramClass
            }
            Self::RetargetDispatchClasspathClass(_) => {
                SynthesisEventKind::RetargetDispatchClasspathClass
            }
            Self::ForwardingMethod { .. } => SynthesisEventKind::ForwardingMethod,
            Self::ExtraInterface { .. } => SynthesisEventKind::ExtraInterface,
        }
    }

    /// The class this event creates or modifies.
    #[must_use]
    pub fn target(&self) -> &TypeRef {
        match self {
            Self::WrapperProgramClass(class)
            | Self::WrapperClasspathClass(class)
            | Self::ApiConversionOutline(class)
            | Self::RetargetDispatchProgramClass(class)
            | Self::RetargetDispatchClasspathClass(class) => &class.ty,
            Self::ApiConversionSuperOutline { holder, .. }
            | Self::CallbackMethod { holder, .. }
            | Self::ForwardingMethod { holder, .. }
            | Self::ExtraInterface { holder, .. } => holder,
        }
    }

    /// The method added by this event, if it adds a single method.
    #[must_use]
    pub fn method(&self) -> Option<&MethodRef> {
        match self {
            Self::ApiConversionSuperOutline { method, .. }
            | Self::CallbackMethod { method, .. }
            | Self::ForwardingMethod { method, .. } => Some(&method.reference),
            _ => None,
        }
    }

    /// True if this event adds a whole class.
    #[must_use]
    pub fn is_class(&self) -> bool {
        matches!(
            self,
            Self::WrapperProgramClass(_)
                | Self::WrapperClasspathClass(_)
                | Self::ApiConversionOutline(_)
                | Self::RetargetDispatchProgramClass(_)
                | Self::RetargetDispatchClasspathClass(_)
        )
    }

    fn sort_key(&self) -> (SynthesisEventKind, &TypeRef, Option<&MethodRef>, Option<&TypeRef>) {
        let interface = match self {
            Self::ExtraInterface { interface, .. } => Some(interface),
            _ => None,
        };
        (self.kind(), self.target(), self.method(), interface)
    }
}

impl fmt::Display for SynthesisEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExtraInterface { holder, interface } => {
                write!(f, "{}: {holder} implements {interface}", self.kind())
            }
            _ => match self.method() {
                Some(method) => write!(f, "{}: {method}", self.kind()),
                None => write!(f, "{}: {}", self.kind(), self.target()),
            },
        }
    }
}

/// Receives finished artifacts, exactly once each.
pub trait SynthesisEventConsumer {
    /// Attaches one artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact cannot be attached, e.g. its holder class is unknown.
    fn accept(&mut self, event: SynthesisEvent) -> Result<()>;
}

impl SynthesisEventConsumer for Vec<SynthesisEvent> {
    fn accept(&mut self, event: SynthesisEvent) -> Result<()> {
        self.push(event);
        Ok(())
    }
}

impl SynthesisEventConsumer for AppView {
    fn accept(&mut self, event: SynthesisEvent) -> Result<()> {
        trace!(%event, "committing synthesized artifact");
        match event {
            SynthesisEvent::WrapperClasspathClass(class)
            | SynthesisEvent::RetargetDispatchClasspathClass(class) => {
                // Classpath artifacts are shared between compilation units.
                match self.definition_for(&class.ty) {
                    Some(existing) if !existing.is_program() => {
                        trace!(ty = %class.ty, "classpath class already present, reusing");
                    }
                    Some(_) => {
                        return Err(fatal_error!("synthesized class {} already exists", class.ty));
                    }
                    None => {
                        self.add_class(class);
                    }
                }
            }
            SynthesisEvent::WrapperProgramClass(class)
            | SynthesisEvent::ApiConversionOutline(class)
            | SynthesisEvent::RetargetDispatchProgramClass(class) => {
                if self.definition_for(&class.ty).is_some() {
                    return Err(fatal_error!("synthesized class {} already exists", class.ty));
                }
                self.add_class(class);
            }
            SynthesisEvent::ApiConversionSuperOutline { holder, method }
            | SynthesisEvent::CallbackMethod { holder, method }
            | SynthesisEvent::ForwardingMethod { holder, method } => {
                let class = self
                    .definition_for_mut(&holder)
                    .ok_or_else(|| Error::TypeNotFound(holder.clone()))?;
                if !class.add_method(method) {
                    trace!(%holder, "method already declared, skipping");
                }
            }
            SynthesisEvent::ExtraInterface { holder, interface } => {
                let class = self
                    .definition_for_mut(&holder)
                    .ok_or_else(|| Error::TypeNotFound(holder.clone()))?;
                if !class.interfaces.contains(&interface) {
                    class.interfaces.push(interface);
                }
            }
        }
        Ok(())
    }
}

/// Number of committed events per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesisCounts(BTreeMap<SynthesisEventKind, usize>);

impl SynthesisCounts {
    /// Committed events of `kind`.
    #[must_use]
    pub fn get(&self, kind: SynthesisEventKind) -> usize {
        self.0.get(&kind).copied().unwrap_or(0)
    }

    /// All committed events.
    #[must_use]
    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    /// Non-zero counts in commit order.
    pub fn iter(&self) -> impl Iterator<Item = (SynthesisEventKind, usize)> + '_ {
        self.0.iter().map(|(kind, count)| (*kind, *count))
    }

    fn record(&mut self, kind: SynthesisEventKind) {
        *self.0.entry(kind).or_insert(0) += 1;
    }
}

impl fmt::Display for SynthesisCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (kind, count) in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{kind}: {count}")?;
        }
        Ok(())
    }
}

/// Lock-free queue of finished artifacts.
#[derive(Debug)]
pub struct SynthesisQueue {
    events: boxcar::Vec<SynthesisEvent>,
}

impl Default for SynthesisQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthesisQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }

    /// Enqueues one artifact. Safe to call from any worker.
    pub fn push(&self, event: SynthesisEvent) {
        self.events.push(event);
    }

    /// Number of queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// True if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of queued events of `kind`.
    #[must_use]
    pub fn count(&self, kind: SynthesisEventKind) -> usize {
        self.events
            .iter()
            .filter(|(_, event)| event.kind() == kind)
            .count()
    }

    /// True if a class with type `ty` is queued.
    #[must_use]
    pub fn contains_class(&self, ty: &TypeRef) -> bool {
        self.events
            .iter()
            .any(|(_, event)| event.is_class() && event.target() == ty)
    }

    /// Commits every queued event to `consumer` in kind, target and method order, leaving the
    /// queue empty.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first error reported by `consumer`.
    pub fn drain_into(
        &mut self,
        consumer: &mut impl SynthesisEventConsumer,
    ) -> Result<SynthesisCounts> {
        let queued = std::mem::replace(&mut self.events, boxcar::Vec::new());
        let mut events: Vec<SynthesisEvent> = queued.into_iter().collect();
        events.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let mut counts = SynthesisCounts::default();
        for event in events {
            counts.record(event.kind());
            consumer.accept(event)?;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;
    use crate::{
        metadata::{
            class::ClassKind,
            flags::{ClassAccessFlags, MethodAccessFlags},
            types::Proto,
        },
        test::factories::{library_class, program_class},
    };

    fn callback(holder: &str, name: &str) -> SynthesisEvent {
        SynthesisEvent::CallbackMethod {
            holder: TypeRef::new(holder),
            method: MethodDef::new(
                MethodRef::new(
                    TypeRef::new(holder),
                    name,
                    Proto::new(TypeRef::void(), vec![]),
                ),
                MethodAccessFlags::PUBLIC | MethodAccessFlags::SYNTHETIC,
            ),
        }
    }

    fn wrapper(name: &str) -> SynthesisEvent {
        SynthesisEvent::WrapperClasspathClass(ClassDef::new(
            ClassKind::Classpath,
            TypeRef::new(name),
            ClassAccessFlags::PUBLIC | ClassAccessFlags::FINAL | ClassAccessFlags::SYNTHETIC,
            Some(TypeRef::object()),
        ))
    }

    #[test]
    fn drain_order_is_deterministic() -> Result<()> {
        let mut queue = SynthesisQueue::new();
        queue.push(callback("app.B", "run"));
        queue.push(wrapper("x.Z$-WRP"));
        queue.push(callback("app.A", "zap"));
        queue.push(callback("app.A", "apply"));
        queue.push(wrapper("x.A$-WRP"));

        let mut received = Vec::new();
        let counts = queue.drain_into(&mut received)?;
        let order: Vec<String> = received.iter().map(ToString::to_string).collect();
        assert_eq!(
            order,
            vec![
                "wrapper-classpath-class: x.A$-WRP",
                "wrapper-classpath-class: x.Z$-WRP",
                "callback-method: app.A#apply()void",
                "callback-method: app.A#zap()void",
                "callback-method: app.B#run()void",
            ]
        );
        assert_eq!(counts.get(SynthesisEventKind::CallbackMethod), 3);
        assert_eq!(counts.total(), 5);
        assert!(queue.is_empty());
        Ok(())
    }

    #[test]
    fn app_consumer_attaches_methods_and_interfaces() -> Result<()> {
        let mut app = AppView::new();
        app.add_class(library_class("java.lang.Object", None));
        app.add_class(program_class("app.A", "java.lang.Object"));

        let mut queue = SynthesisQueue::new();
        queue.push(callback("app.A", "run"));
        queue.push(callback("app.A", "run"));
        queue.push(SynthesisEvent::ExtraInterface {
            holder: TypeRef::new("app.A"),
            interface: TypeRef::new("j$.Dispatch"),
        });
        queue.drain_into(&mut app)?;

        let class = app.definition_for(&TypeRef::new("app.A")).expect("class");
        assert_eq!(class.methods.len(), 1);
        assert_eq!(class.interfaces, vec![TypeRef::new("j$.Dispatch")]);
        Ok(())
    }

    #[test]
    fn app_consumer_rejects_unknown_holder_and_duplicate_class() {
        let mut app = AppView::new();
        let mut queue = SynthesisQueue::new();
        queue.push(callback("app.Missing", "run"));
        assert!(matches!(
            queue.drain_into(&mut app),
            Err(Error::TypeNotFound(_))
        ));

        app.add_class(program_class("x.A$-WRP", "java.lang.Object"));
        queue.push(wrapper("x.A$-WRP"));
        assert!(matches!(queue.drain_into(&mut app), Err(Error::Fatal { .. })));
    }

    #[test]
    fn app_consumer_reuses_existing_classpath_class() -> Result<()> {
        let mut app = AppView::new();
        let mut existing = ClassDef::new(
            ClassKind::Classpath,
            TypeRef::new("x.A$-WRP"),
            ClassAccessFlags::PUBLIC | ClassAccessFlags::FINAL,
            Some(TypeRef::object()),
        );
        existing.interfaces.push(TypeRef::new("x.A"));
        app.add_class(existing);

        let mut queue = SynthesisQueue::new();
        queue.push(wrapper("x.A$-WRP"));
        let counts = queue.drain_into(&mut app)?;
        assert_eq!(counts.get(SynthesisEventKind::WrapperClasspathClass), 1);

        let class = app.definition_for(&TypeRef::new("x.A$-WRP")).expect("class");
        assert_eq!(class.interfaces, vec![TypeRef::new("x.A")]);
        assert!(!class.flags.contains(ClassAccessFlags::SYNTHETIC));

        let outline = ClassDef::new(
            ClassKind::Program,
            TypeRef::new("x.A$-WRP"),
            ClassAccessFlags::SYNTHETIC,
            Some(TypeRef::object()),
        );
        queue.push(SynthesisEvent::ApiConversionOutline(outline));
        assert!(matches!(queue.drain_into(&mut app), Err(Error::Fatal { .. })));
        Ok(())
    }

    #[test]
    fn kinds_display_kebab_case() {
        let names: Vec<&'static str> = SynthesisEventKind::iter().map(Into::into).collect();
        assert_eq!(names.len(), 9);
        assert_eq!(names[0], "wrapper-program-class");
        assert_eq!(
            SynthesisEventKind::RetargetDispatchClasspathClass.to_string(),
            "retarget-dispatch-classpath-class"
        );
    }
}
