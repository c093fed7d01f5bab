//! The desugaring pipeline.
//!
//! [`DesugaringPipeline`] drives one run over an [`AppView`]:
//!
//! 1. **Pre-passes** (single threaded, mutate the app): library amendment, custom conversion
//!    rewriting of library builds, declaration of missing retarget destinations and the check
//!    for missing retarget sources.
//! 2. **Sweep**: every program method body is detached and processed on the rayon pool.
//!    Per method, callbacks are registered, then invokes are retargeted, then converted.
//!    Workers only read the app; everything they synthesize is queued.
//! 3. **Finalization**: pending callbacks are built, wrappers are synthesized, the emulated
//!    dispatch tree is fixed and tracked conversions are reported.
//! 4. **Commit**: the synthesis queue is drained into the app in deterministic order.
//! 5. **Output rename**: `T -> T'` and `V(T) -> T`, followed by a check that no vivified type
//!    escaped into a program class.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut pipeline = DesugaringPipeline::new(spec, DesugarOptions::default());
//! let summary = pipeline.run(&mut app)?;
//! println!("{summary}");
//! ```

use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::{
    desugar::{
        amender::LibraryAmender,
        collaborators::{EmulatedInterfaceInvokes, InvokeDesugaring},
        context::DesugarContext,
        conversion::{
            ApiConversionValidator, ApiConverter, CallbackRegistry, CustomConversionRewriter,
            WrapperSynthesizer,
        },
        events::SynthesisCounts,
        options::DesugarOptions,
        retarget::{
            check_for_assumed_library_types, EmulatedDispatchTreeFixer, LibraryTypeSynthesizer,
            Retargeter, RetargeterSyntheticHelper, RetargetingInfo,
        },
        rewrite::{apply_type_rewrites, verify_no_vivified_types},
        specification::{DesugaredLibrarySpecification, MultiApiLevelSpecification},
    },
    ir::Code,
    metadata::{app::AppView, diagnostics::Diagnostics, types::TypeRef},
    Error, Result,
};

/// Outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct DesugaringSummary {
    /// Library members declared by the amender.
    pub amended: usize,
    /// Custom conversion methods rewritten to vivified signatures.
    pub custom_conversions: usize,
    /// Retarget destination classes declared on the library.
    pub library_types: usize,
    /// Program methods visited by the sweep.
    pub methods: usize,
    /// Invokes redirected to retarget destinations.
    pub retargeted: usize,
    /// Invokes whose arguments or result were converted.
    pub converted: usize,
    /// Callbacks built for library overrides.
    pub callbacks: usize,
    /// Wrapper pairs synthesized.
    pub wrappers: usize,
    /// Program classes that received an emulated dispatch interface.
    pub dispatch_fixes: usize,
    /// Committed synthesis events per kind.
    pub events: SynthesisCounts,
    /// Classes changed by the output rename.
    pub renamed: usize,
    /// Everything reported during the run.
    pub diagnostics: Arc<Diagnostics>,
}

impl fmt::Display for DesugaringSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Desugared {} method(s): {} retargeted, {} converted invoke(s)",
            self.methods, self.retargeted, self.converted
        )?;
        writeln!(
            f,
            "Synthesized {} callback(s), {} wrapper(s), {} dispatch fix(es)",
            self.callbacks, self.wrappers, self.dispatch_fixes
        )?;
        writeln!(
            f,
            "Pre-passes: {} amended, {} custom conversion(s), {} library type(s)",
            self.amended, self.custom_conversions, self.library_types
        )?;
        writeln!(f, "Events: {}", self.events)?;
        write!(f, "{}", self.diagnostics.summary().trim_end())
    }
}

/// Counters shared by the sweep workers.
#[derive(Default)]
struct SweepCounters {
    methods: AtomicUsize,
    retargeted: AtomicUsize,
    converted: AtomicUsize,
}

#[derive(Default)]
struct SweepResult {
    methods: usize,
    retargeted: usize,
    converted: usize,
    callbacks: usize,
    wrappers: usize,
    dispatch_fixes: usize,
}

/// A program method whose body is detached from the app for the sweep.
struct MethodJob {
    holder: TypeRef,
    index: usize,
    code: Option<Code>,
}

/// Runs desugared library interop over an application.
pub struct DesugaringPipeline {
    ctx: DesugarContext,
}

impl DesugaringPipeline {
    /// Creates a pipeline for the selected specification tables.
    #[must_use]
    pub fn new(spec: DesugaredLibrarySpecification, options: DesugarOptions) -> Self {
        DesugaringPipeline {
            ctx: DesugarContext::new(spec, options),
        }
    }

    /// Creates a pipeline from a JSON configuration, selecting the tables for the minimum API
    /// level of `options`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be parsed.
    pub fn from_json(
        json: &str,
        options: DesugarOptions,
        library_compilation: bool,
    ) -> Result<Self> {
        let multi = MultiApiLevelSpecification::from_json(json)?;
        let spec = multi.for_compilation(options.min_api_level, library_compilation);
        Ok(Self::new(spec, options))
    }

    /// The shared state of the run.
    #[must_use]
    pub fn context(&self) -> &DesugarContext {
        &self.ctx
    }

    /// Desugars `app` in place.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - a conversion that must succeed in a library build cannot be generated
    /// - a synthesized artifact cannot be attached to the app
    /// - validation is enabled and finds a missing callback or conversion holder
    /// - a vivified type survives the output rename
    #[instrument(skip_all, fields(classes = app.len()))]
    pub fn run(&mut self, app: &mut AppView) -> Result<DesugaringSummary> {
        let amended = LibraryAmender::new(&self.ctx).amend(app);
        let custom_conversions = CustomConversionRewriter::new(&self.ctx).rewrite(app);

        let info = RetargetingInfo::compute(app, &self.ctx.spec);
        let library_types = LibraryTypeSynthesizer::new(&self.ctx).synthesize(app, &info);
        check_for_assumed_library_types(app, &self.ctx);

        let mut jobs = detach_bodies(app);
        let sweep = self.desugar_methods(app, &info, &mut jobs);
        reattach_bodies(app, jobs)?;
        let sweep = sweep?;

        let events = self.ctx.queue.drain_into(app)?;
        debug!(events = events.total(), "committed synthesized artifacts");

        if self.ctx.options.validate_synthesis {
            self.validate(app, &info)?;
        }

        let renamed = if self.ctx.options.apply_type_rewrites {
            let renamed = apply_type_rewrites(app, &self.ctx);
            verify_no_vivified_types(app)?;
            renamed
        } else {
            0
        };

        let summary = DesugaringSummary {
            amended,
            custom_conversions,
            library_types,
            methods: sweep.methods,
            retargeted: sweep.retargeted,
            converted: sweep.converted,
            callbacks: sweep.callbacks,
            wrappers: sweep.wrappers,
            dispatch_fixes: sweep.dispatch_fixes,
            events,
            renamed,
            diagnostics: Arc::clone(&self.ctx.diagnostics),
        };
        info!(
            methods = summary.methods,
            converted = summary.converted,
            retargeted = summary.retargeted,
            "desugaring finished"
        );
        Ok(summary)
    }

    /// The sweep and the finalization. Everything synthesized ends up in the queue.
    fn desugar_methods(
        &self,
        app: &AppView,
        info: &RetargetingInfo,
        jobs: &mut [MethodJob],
    ) -> Result<SweepResult> {
        let ctx = &self.ctx;
        let helper = RetargeterSyntheticHelper::new(ctx, info);
        let retargeter = Retargeter::new(ctx, info, &helper);
        let emulated = EmulatedInterfaceInvokes::new(&ctx.spec.emulate_interface);
        let wrappers = WrapperSynthesizer::new(ctx);
        let callbacks = CallbackRegistry::new(ctx);
        let collaborators: Vec<&dyn InvokeDesugaring> = vec![&retargeter, &emulated];
        let converter = ApiConverter::new(ctx, &wrappers, &callbacks, collaborators);

        let counters = SweepCounters::default();
        let process = |job: &mut MethodJob| -> Result<()> {
            let class = app
                .definition_for(&job.holder)
                .ok_or_else(|| Error::TypeNotFound(job.holder.clone()))?;
            let method = class.methods.get(job.index).ok_or_else(|| {
                Error::MethodNotFound(format!("{}#{}", job.holder, job.index))
            })?;
            converter.register_callback_if_required(app, class, method)?;
            if let Some(code) = job.code.as_mut() {
                let retargeted = retargeter.desugar(app, &method.reference, code)?;
                let converted = converter.desugar(app, &method.reference, code)?;
                counters.retargeted.fetch_add(retargeted, Ordering::Relaxed);
                counters.converted.fetch_add(converted, Ordering::Relaxed);
            }
            counters.methods.fetch_add(1, Ordering::Relaxed);
            Ok(())
        };
        if ctx.options.parallel {
            jobs.par_iter_mut().try_for_each(process)?;
        } else {
            jobs.iter_mut().try_for_each(process)?;
        }

        let callbacks_built = callbacks.materialize(&wrappers)?;
        let wrapper_classes = wrappers.synthesize(app);
        let dispatch_fixes = EmulatedDispatchTreeFixer::new(ctx, info, &helper).fix_app(app)?;
        converter.report_tracked();

        Ok(SweepResult {
            methods: counters.methods.into_inner(),
            retargeted: counters.retargeted.into_inner(),
            converted: counters.converted.into_inner(),
            callbacks: callbacks_built,
            wrappers: wrapper_classes,
            dispatch_fixes,
        })
    }

    fn validate(&self, app: &AppView, info: &RetargetingInfo) -> Result<()> {
        let helper = RetargeterSyntheticHelper::new(&self.ctx, info);
        let retargeter = Retargeter::new(&self.ctx, info, &helper);
        let emulated = EmulatedInterfaceInvokes::new(&self.ctx.spec.emulate_interface);
        let validator = ApiConversionValidator::new(&self.ctx, vec![&retargeter, &emulated]);
        let checked = validator.validate(app)?;
        debug!(checked, "validated synthesized state");
        Ok(())
    }
}

fn detach_bodies(app: &mut AppView) -> Vec<MethodJob> {
    let mut jobs = Vec::new();
    for class in app.classes_mut().filter(|class| class.is_program()) {
        for (index, method) in class.methods.iter_mut().enumerate() {
            jobs.push(MethodJob {
                holder: class.ty.clone(),
                index,
                code: method.code.take(),
            });
        }
    }
    jobs
}

fn reattach_bodies(app: &mut AppView, jobs: Vec<MethodJob>) -> Result<()> {
    for job in jobs {
        let class = app
            .definition_for_mut(&job.holder)
            .ok_or_else(|| Error::TypeNotFound(job.holder.clone()))?;
        if let Some(method) = class.methods.get_mut(job.index) {
            method.code = job.code;
        }
    }
    Ok(())
}
