//! Bodies of synthesized conversion code.
//!
//! Every converting method the engine emits (wrapper forwarders, call-site outlines, callbacks)
//! has the same shape: load the arguments, convert some of them, call the target, convert the
//! result. [`ForwardingCall`] describes one such method and produces its body. The remaining
//! functions build the fixed bodies of wrapper classes.

use crate::{
    ir::{Code, CodeBuilder, IfKind, InvokeKind, ValueId},
    metadata::types::{
        FieldRef, MethodRef, Proto, TypeRef, CONSTRUCTOR_NAME, RUNTIME_EXCEPTION_TYPE,
        STRING_TYPE,
    },
};

/// Where the receiver of the forwarded call comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ForwardingReceiver {
    /// The target is static.
    None,
    /// The first incoming argument, of the given type.
    Argument(TypeRef),
    /// The wrapped value field of `this`.
    WrappedField(FieldRef),
}

/// A synthesized method that forwards its arguments to `target`, converting on the way.
#[derive(Debug, Clone)]
pub struct ForwardingCall {
    /// Source of the receiver.
    pub receiver: ForwardingReceiver,
    /// Incoming parameter types, receiver excluded.
    pub parameters: Vec<TypeRef>,
    /// Conversion applied to each incoming parameter, `None` to pass it through.
    pub conversions: Vec<Option<MethodRef>>,
    /// Invoke used to reach `target`.
    pub kind: InvokeKind,
    /// The forwarded-to method.
    pub target: MethodRef,
    /// True if the holder of `target` is an interface.
    pub interface: bool,
    /// Conversion applied to the result.
    pub return_conversion: Option<MethodRef>,
}

impl ForwardingCall {
    /// A static call of `target` with a prototype matching `parameters`.
    #[must_use]
    pub fn to_static(target: MethodRef, parameters: Vec<TypeRef>) -> Self {
        let conversions = vec![None; parameters.len()];
        ForwardingCall {
            receiver: ForwardingReceiver::None,
            parameters,
            conversions,
            kind: InvokeKind::Static,
            target,
            interface: false,
            return_conversion: None,
        }
    }

    /// Builds the body.
    #[must_use]
    pub fn conversion_body(&self) -> Code {
        let mut builder = CodeBuilder::new();
        let receiver = match &self.receiver {
            ForwardingReceiver::None => None,
            ForwardingReceiver::Argument(ty) => Some(builder.argument(ty.clone())),
            ForwardingReceiver::WrappedField(field) => {
                let this = builder.argument(field.holder.clone());
                Some(builder.instance_get(this, field.clone()))
            }
        };
        let incoming = builder.arguments(&self.parameters);

        let mut args: Vec<ValueId> = receiver.into_iter().collect();
        for (index, value) in incoming.into_iter().enumerate() {
            match self.conversions.get(index).and_then(Option::as_ref) {
                Some(conversion) => args.push(builder.convert(conversion.clone(), value)),
                None => args.push(value),
            }
        }

        let result = builder.invoke(self.kind, self.target.clone(), args, self.interface);
        let result = match (result, &self.return_conversion) {
            (Some(value), Some(conversion)) => Some(builder.convert(conversion.clone(), value)),
            (result, _) => result,
        };
        builder.return_value(result);
        builder.build()
    }
}

/// The `<init>(field type)` of a wrapper: call the super constructor, store the wrapped value.
#[must_use]
pub fn wrapper_constructor_body(field: &FieldRef, super_type: &TypeRef) -> Code {
    let mut builder = CodeBuilder::new();
    let this = builder.argument(field.holder.clone());
    let value = builder.argument(field.ty.clone());
    builder.invoke(
        InvokeKind::Direct,
        MethodRef::new(
            super_type.clone(),
            CONSTRUCTOR_NAME,
            Proto::new(TypeRef::void(), vec![]),
        ),
        vec![this],
        false,
    );
    builder.instance_put(this, value, field.clone());
    builder.return_value(None);
    builder.build()
}

/// The static `convert` of a wrapper:
///
/// ```text
/// if (value == null) return null;
/// if (value instanceof Opposite) return ((Opposite) value).wrappedValue;
/// return new Wrapper(value);
/// ```
#[must_use]
pub fn wrapper_convert_body(
    convert: &MethodRef,
    constructor: &MethodRef,
    opposite_field: &FieldRef,
) -> Code {
    let mut builder = CodeBuilder::new();
    let from = convert
        .proto
        .parameters
        .first()
        .cloned()
        .unwrap_or_else(TypeRef::object);
    let value = builder.argument(from);
    let (is_null, not_null) = builder.branch(IfKind::Eqz, value);

    builder.switch_to(is_null);
    let null = builder.const_null(convert.proto.return_type.clone());
    builder.return_value(Some(null));

    builder.switch_to(not_null);
    let is_wrapped = builder.instance_of(value, opposite_field.holder.clone());
    let (unwrap, wrap) = builder.branch(IfKind::Nez, is_wrapped);

    builder.switch_to(unwrap);
    let wrapper = builder.check_cast(value, opposite_field.holder.clone());
    let unwrapped = builder.instance_get(wrapper, opposite_field.clone());
    builder.return_value(Some(unwrapped));

    builder.switch_to(wrap);
    let created = builder.new_instance(constructor.holder.clone());
    builder.invoke(
        InvokeKind::Direct,
        constructor.clone(),
        vec![created, value],
        false,
    );
    builder.return_value(Some(created));
    builder.build()
}

/// A body that throws `new RuntimeException(message)`.
#[must_use]
pub fn throwing_body(parameters: &[TypeRef], message: &str) -> Code {
    let mut builder = CodeBuilder::new();
    builder.arguments(parameters);
    let exception_type = TypeRef::new(RUNTIME_EXCEPTION_TYPE);
    let exception = builder.new_instance(exception_type.clone());
    let text = builder.const_string(message);
    builder.invoke(
        InvokeKind::Direct,
        MethodRef::new(
            exception_type,
            CONSTRUCTOR_NAME,
            Proto::new(TypeRef::void(), vec![TypeRef::new(STRING_TYPE)]),
        ),
        vec![exception, text],
        false,
    );
    builder.throw(exception);
    builder.build()
}
