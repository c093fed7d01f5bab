//! Read-only verification of API conversion.
//!
//! [`ApiConversionValidator`] asks the same questions as the
//! [`crate::desugar::conversion::ApiConverter`] but never generates anything. Run over an
//! application whose conversion state has already been committed, every answer must already be
//! reflected in the class graph; anything missing is a phase ordering bug and is returned as
//! [`Error::GenerationInAssertMode`].

use tracing::debug;

use crate::{
    desugar::{
        collaborators::InvokeDesugaring,
        context::DesugarContext,
        conversion::{
            policy::{ApiConversionQuery, ConversionPolicy},
            wrapper::{Direction, WrapperSynthesizer},
        },
        synthetic::CONVERT_METHOD_NAME,
    },
    ir::Invoke,
    metadata::{
        app::AppView,
        class::{ClassDef, MethodDef},
        types::{MethodRef, TypeRef},
    },
    Error, Result,
};

/// Verifies that callbacks and conversion holders exist without creating them.
pub struct ApiConversionValidator<'a> {
    policy: ConversionPolicy<'a>,
    wrappers: WrapperSynthesizer<'a>,
}

impl<'a> ApiConversionValidator<'a> {
    /// Creates a validator with the same collaborators as the converter it checks.
    #[must_use]
    pub fn new(ctx: &'a DesugarContext, collaborators: Vec<&'a dyn InvokeDesugaring>) -> Self {
        ApiConversionValidator {
            policy: ConversionPolicy::new(ctx, collaborators),
            wrappers: WrapperSynthesizer::new(ctx),
        }
    }

    /// Checks every program method of `app`. Returns the number of methods checked.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GenerationInAssertMode`] for the first missing callback or conversion
    /// holder.
    pub fn validate(&self, app: &AppView) -> Result<usize> {
        let mut checked = 0;
        for class in app.program_classes() {
            for method in &class.methods {
                self.validate_method(app, class, method)?;
                checked += 1;
            }
        }
        debug!(methods = checked, "validated api conversion state");
        Ok(checked)
    }

    /// Checks one method of `holder`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GenerationInAssertMode`] if the callback of `method` or a conversion
    /// holder its body relies on is missing.
    pub fn validate_method(
        &self,
        app: &AppView,
        holder: &ClassDef,
        method: &MethodDef,
    ) -> Result<()> {
        if self.should_register_callback(app, holder, method) {
            let callback = self
                .policy
                .ctx()
                .vivified_method(&method.reference, holder.ty.clone());
            if holder.lookup_method(&callback).is_none() {
                return Err(Error::GenerationInAssertMode(format!(
                    "callback {callback} of {}",
                    method.reference
                )));
            }
        }

        let Some(code) = &method.code else {
            return Ok(());
        };
        for invoke in code.invokes() {
            if self.needs_desugaring(app, invoke, &method.reference) {
                self.validate_conversions(app, invoke)?;
            } else if is_conversion_call(invoke)
                && app.definition_for(&invoke.method.holder).is_none()
            {
                return Err(Error::GenerationInAssertMode(format!(
                    "conversion holder {} called from {}",
                    invoke.method.holder, method.reference
                )));
            }
        }
        Ok(())
    }

    fn validate_conversions(&self, app: &AppView, invoke: &Invoke) -> Result<()> {
        let ctx = self.policy.ctx();
        let proto = &invoke.method.proto;
        let slots = proto
            .parameters
            .iter()
            .map(|ty| (ty, Direction::ToVivified))
            .chain(std::iter::once((&proto.return_type, Direction::FromVivified)));
        for (ty, direction) in slots {
            if !ctx.is_rewritten(ty) || !self.wrappers.can_convert(ty) {
                continue;
            }
            let holder = self.wrappers.conversion_holder(ty, direction);
            if app.definition_for(&holder).is_none() {
                return Err(Error::GenerationInAssertMode(format!(
                    "conversion holder {holder} of {ty} for {}",
                    invoke.method
                )));
            }
        }
        Ok(())
    }
}

impl ApiConversionQuery for ApiConversionValidator<'_> {
    fn policy(&self) -> &ConversionPolicy<'_> {
        &self.policy
    }
}

fn is_conversion_call(invoke: &Invoke) -> bool {
    let method: &MethodRef = &invoke.method;
    invoke.is_static()
        && method.name() == CONVERT_METHOD_NAME
        && method.proto.arity() == 1
        && method.proto.types().any(TypeRef::is_vivified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        desugar::options::DesugarOptions,
        ir::InvokeKind,
        metadata::{
            class::ClassKind,
            flags::{ClassAccessFlags, MethodAccessFlags},
        },
        test::factories::{
            calling_method, method, mref, platform, program_class, specification, CONSUMER,
        },
    };

    fn context() -> DesugarContext {
        DesugarContext::new(specification(), DesugarOptions::default())
    }

    #[test]
    fn missing_callback_is_reported() {
        let mut app = platform();
        let mut list = program_class("app.MyList", "java.util.ArrayList");
        let for_each = method(
            "app.MyList",
            "forEach",
            "void",
            &[CONSUMER],
            MethodAccessFlags::PUBLIC,
        );
        list.add_method(for_each.clone());
        app.add_class(list.clone());

        let ctx = context();
        let validator = ApiConversionValidator::new(&ctx, vec![]);
        let result = validator.validate_method(&app, &list, &for_each);
        assert!(matches!(result, Err(Error::GenerationInAssertMode(_))));

        let callback = ctx.vivified_method(&for_each.reference, list.ty.clone());
        list.add_method(MethodDef::new(callback, MethodAccessFlags::PUBLIC));
        assert!(validator.validate_method(&app, &list, &for_each).is_ok());
    }

    #[test]
    fn missing_wrapper_holder_is_reported() -> Result<()> {
        let mut app = platform();
        let for_each = mref("java.util.ArrayList", "forEach", "void", &[CONSUMER]);
        let mut main = program_class("app.Main", "java.lang.Object");
        main.add_method(calling_method("app.Main", "run", InvokeKind::Virtual, &for_each));
        app.add_class(main);

        let ctx = context();
        let validator = ApiConversionValidator::new(&ctx, vec![]);
        assert!(matches!(
            validator.validate(&app),
            Err(Error::GenerationInAssertMode(message)) if message.contains("Consumer$-WRP")
        ));

        app.add_class(ClassDef::new(
            ClassKind::Classpath,
            TypeRef::new("java.util.function.Consumer$-WRP"),
            ClassAccessFlags::PUBLIC | ClassAccessFlags::FINAL,
            Some(TypeRef::object()),
        ));
        assert_eq!(validator.validate(&app)?, 1);
        Ok(())
    }
}
