//! Desugared library specification tables.
//!
//! A desugared library is described by a JSON configuration shipped with the library. It
//! lists which packages are renamed, which types are wrapped or converted by hand, which core
//! library members are retargeted to backports and which library methods must be amended.
//! The engine consumes only the in-memory tables of [`DesugaredLibrarySpecification`]; this
//! module also provides the JSON front end for both historical dialects:
//!
//! | `configuration_format_version` | Dialect | Shape |
//! |---|---|---|
//! | `< 100` | [`SpecificationDialect::Legacy`] | `version`, `library_flags`, `program_flags` |
//! | `>= 100` | [`SpecificationDialect::Human`] | `identifier`, `common_flags`, `library_flags`, `program_flags` |
//!
//! Every flag list entry is keyed by an [`ApiLevelRange`] (`api_level_below_or_equal` and an
//! optional `api_level_greater_or_equal`). Selecting the tables for one compilation keeps the
//! entries whose range contains the minimum API level, in range order, first entry wins.
//!
//! # Example
//!
//! ```rust
//! use vivify::desugar::specification::MultiApiLevelSpecification;
//! use vivify::metadata::apilevel::AndroidApiLevel;
//!
//! let json = r#"{
//!     "configuration_format_version": 100,
//!     "identifier": "example:desugar_jdk_libs_configuration:1.0.0",
//!     "required_compilation_api_level": 30,
//!     "synthesized_library_classes_package_prefix": "j$.",
//!     "common_flags": [{
//!         "api_level_below_or_equal": 23,
//!         "rewrite_prefix": { "java.util.function.": "j$.util.function." },
//!         "wrapper_conversion": ["java.util.function.IntUnaryOperator"]
//!     }],
//!     "library_flags": [],
//!     "program_flags": []
//! }"#;
//!
//! let multi = MultiApiLevelSpecification::from_json(json)?;
//! let spec = multi.for_compilation(AndroidApiLevel::new(21), false);
//! assert_eq!(spec.wrapper_conversion.len(), 1);
//! # Ok::<(), vivify::Error>(())
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::{
    metadata::{
        apilevel::{AndroidApiLevel, ApiLevelRange},
        flags::{FieldAccessFlags, MethodAccessFlags},
        rewriter::PrefixTypeRewriter,
        types::{FieldRef, MethodRef, Proto, TypeRef},
    },
    Error, Result,
};

/// First configuration format version using the human dialect.
pub const HUMAN_DIALECT_MIN_VERSION: u32 = 100;

/// The two historical shapes of the JSON configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display)]
pub enum SpecificationDialect {
    /// Flat `library_flags`/`program_flags` lists, `version` string
    #[default]
    Legacy,
    /// `common_flags` plus per-target lists, `identifier` string
    Human,
}

impl SpecificationDialect {
    /// Selects the dialect for a format version.
    #[must_use]
    pub fn for_version(version: u32) -> Self {
        if version >= HUMAN_DIALECT_MIN_VERSION {
            SpecificationDialect::Human
        } else {
            SpecificationDialect::Legacy
        }
    }
}

/// The tables consumed by the desugaring engine for one compilation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DesugaredLibrarySpecification {
    /// Identifier of the configuration (or the legacy `version`)
    pub identifier: String,
    /// Dialect the tables were loaded from
    pub dialect: SpecificationDialect,
    /// Minimum platform the library must be compiled against
    pub required_compilation_api_level: AndroidApiLevel,
    /// Package prefix of library classes synthesized for the desugared library
    pub synthesized_library_classes_package_prefix: String,
    /// True when the desugared library itself is being compiled
    pub library_compilation: bool,
    /// Register callbacks for every library override, even in library builds
    pub support_all_callbacks_from_library: bool,
    /// Package prefix renames (`java.time.` -> `j$.time.`)
    pub rewrite_prefix: BTreeMap<String, String>,
    /// Prefixes excluded from [`Self::rewrite_prefix`]
    pub dont_rewrite_prefix: BTreeSet<String>,
    /// Types for which wrappers may be generated, in configuration order
    pub wrapper_conversion: Vec<TypeRef>,
    /// Type -> hand written conversion holder
    pub custom_conversion: BTreeMap<TypeRef, TypeRef>,
    /// Method name -> source holder -> destination holder
    pub retarget_core_library_member: BTreeMap<String, BTreeMap<TypeRef, TypeRef>>,
    /// Holder -> holder of the backported members
    pub backport_core_library_member: BTreeMap<TypeRef, TypeRef>,
    /// Library interface -> rewritten interface
    pub emulate_interface: BTreeMap<TypeRef, TypeRef>,
    /// Context types whose invokes are never retargeted
    pub dont_retarget: BTreeSet<TypeRef>,
    /// Library methods whose conversions are never outlined
    pub never_outline_api: BTreeSet<MethodRef>,
    /// Library methods missing on some platforms, with their access flags
    pub amend_library_method: BTreeMap<MethodRef, MethodAccessFlags>,
    /// Library fields missing on some platforms, with their access flags
    pub amend_library_field: BTreeMap<FieldRef, FieldAccessFlags>,
}

impl DesugaredLibrarySpecification {
    /// Creates empty tables with the given identifier and synthesized package prefix.
    pub fn new(identifier: impl Into<String>, prefix: impl Into<String>) -> Self {
        DesugaredLibrarySpecification {
            identifier: identifier.into(),
            synthesized_library_classes_package_prefix: prefix.into(),
            ..Default::default()
        }
    }

    /// Adds a package rename.
    #[must_use]
    pub fn with_rewrite_prefix(mut self, prefix: &str, replacement: &str) -> Self {
        self.rewrite_prefix
            .insert(prefix.to_string(), replacement.to_string());
        self
    }

    /// Adds a wrappable type.
    #[must_use]
    pub fn with_wrapper(mut self, ty: &str) -> Self {
        let ty = TypeRef::new(ty);
        if !self.wrapper_conversion.contains(&ty) {
            self.wrapper_conversion.push(ty);
        }
        self
    }

    /// Adds a custom conversion holder for `ty`.
    #[must_use]
    pub fn with_custom_conversion(mut self, ty: &str, holder: &str) -> Self {
        self.custom_conversion
            .insert(TypeRef::new(ty), TypeRef::new(holder));
        self
    }

    /// Adds a core library member retarget `from#name -> to`.
    #[must_use]
    pub fn with_retarget(mut self, name: &str, from: &str, to: &str) -> Self {
        self.retarget_core_library_member
            .entry(name.to_string())
            .or_default()
            .insert(TypeRef::new(from), TypeRef::new(to));
        self
    }

    /// Adds an emulated interface.
    #[must_use]
    pub fn with_emulated_interface(mut self, interface: &str, rewritten: &str) -> Self {
        self.emulate_interface
            .insert(TypeRef::new(interface), TypeRef::new(rewritten));
        self
    }

    /// Marks the tables as those of a library build.
    #[must_use]
    pub fn for_library_compilation(mut self) -> Self {
        self.library_compilation = true;
        self
    }

    /// True if `ty` may be wrapped.
    #[must_use]
    pub fn is_wrappable(&self, ty: &TypeRef) -> bool {
        self.wrapper_conversion.contains(ty)
    }

    /// The custom conversion holder configured for `ty`.
    #[must_use]
    pub fn custom_conversion_for(&self, ty: &TypeRef) -> Option<&TypeRef> {
        self.custom_conversion.get(ty)
    }

    /// True if `ty` is an emulated interface.
    #[must_use]
    pub fn is_emulated_interface(&self, ty: &TypeRef) -> bool {
        self.emulate_interface.contains_key(ty)
    }

    /// True if any retargeting is configured.
    #[must_use]
    pub fn has_retargeting(&self) -> bool {
        !self.retarget_core_library_member.is_empty()
            || !self.backport_core_library_member.is_empty()
    }

    /// Builds the prefix based type-rewrite oracle described by these tables.
    #[must_use]
    pub fn type_rewriter(&self) -> PrefixTypeRewriter {
        PrefixTypeRewriter::new(
            self.rewrite_prefix
                .iter()
                .map(|(p, r)| (p.clone(), r.clone())),
            self.dont_rewrite_prefix.iter().cloned(),
        )
    }
}

/// One API-level keyed flag set as it appears in JSON.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFlags {
    api_level_below_or_equal: u32,
    #[serde(default)]
    api_level_greater_or_equal: Option<u32>,
    #[serde(default)]
    rewrite_prefix: BTreeMap<String, String>,
    #[serde(default, alias = "dont_rewrite")]
    dont_rewrite_prefix: Vec<String>,
    #[serde(default)]
    wrapper_conversion: Vec<String>,
    #[serde(default)]
    custom_conversion: BTreeMap<String, String>,
    #[serde(default, alias = "retarget_lib_member")]
    retarget_core_library_member: BTreeMap<String, String>,
    #[serde(default, alias = "backport")]
    backport_core_library_member: BTreeMap<String, String>,
    #[serde(default)]
    emulate_interface: BTreeMap<String, String>,
    #[serde(default, alias = "dont_retarget_lib_member")]
    dont_retarget: Vec<String>,
    #[serde(default)]
    never_outline_api: Vec<String>,
    #[serde(default)]
    amend_library_method: Vec<String>,
    #[serde(default)]
    amend_library_field: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct RawSpecification {
    configuration_format_version: u32,
    #[serde(default)]
    identifier: Option<String>,
    #[serde(default)]
    version: Option<String>,
    required_compilation_api_level: u32,
    synthesized_library_classes_package_prefix: String,
    #[serde(default)]
    support_all_callbacks_from_library: bool,
    #[serde(default)]
    common_flags: Vec<RawFlags>,
    #[serde(default)]
    library_flags: Vec<RawFlags>,
    #[serde(default)]
    program_flags: Vec<RawFlags>,
    #[serde(default)]
    #[allow(dead_code)]
    shrinker_config: serde_json::Value,
}

/// Parsed tables of one flag set, not yet selected for a compilation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlagSet {
    rewrite_prefix: BTreeMap<String, String>,
    dont_rewrite_prefix: BTreeSet<String>,
    wrapper_conversion: Vec<TypeRef>,
    custom_conversion: BTreeMap<TypeRef, TypeRef>,
    retarget_core_library_member: BTreeMap<String, BTreeMap<TypeRef, TypeRef>>,
    backport_core_library_member: BTreeMap<TypeRef, TypeRef>,
    emulate_interface: BTreeMap<TypeRef, TypeRef>,
    dont_retarget: BTreeSet<TypeRef>,
    never_outline_api: BTreeSet<MethodRef>,
    amend_library_method: BTreeMap<MethodRef, MethodAccessFlags>,
    amend_library_field: BTreeMap<FieldRef, FieldAccessFlags>,
}

fn types(map: BTreeMap<String, String>) -> BTreeMap<TypeRef, TypeRef> {
    map.into_iter()
        .map(|(k, v)| (TypeRef::new(k), TypeRef::new(v)))
        .collect()
}

impl FlagSet {
    fn parse(raw: RawFlags) -> Result<FlagSet> {
        let mut retarget: BTreeMap<String, BTreeMap<TypeRef, TypeRef>> = BTreeMap::new();
        for (member, destination) in raw.retarget_core_library_member {
            let (holder, name) = member.split_once('#').ok_or_else(|| {
                Error::Specification(format!(
                    "retarget entry `{member}` is not of the form `Holder#member`"
                ))
            })?;
            retarget
                .entry(name.to_string())
                .or_default()
                .insert(TypeRef::new(holder), TypeRef::new(destination));
        }

        let mut wrapper_conversion = Vec::new();
        for ty in raw.wrapper_conversion {
            let ty = TypeRef::new(ty);
            if !wrapper_conversion.contains(&ty) {
                wrapper_conversion.push(ty);
            }
        }

        Ok(FlagSet {
            rewrite_prefix: raw.rewrite_prefix,
            dont_rewrite_prefix: raw.dont_rewrite_prefix.into_iter().collect(),
            wrapper_conversion,
            custom_conversion: types(raw.custom_conversion),
            retarget_core_library_member: retarget,
            backport_core_library_member: types(raw.backport_core_library_member),
            emulate_interface: types(raw.emulate_interface),
            dont_retarget: raw.dont_retarget.into_iter().map(TypeRef::new).collect(),
            never_outline_api: raw
                .never_outline_api
                .iter()
                .map(|m| parse_method(m).map(|(_, method)| method))
                .collect::<Result<_>>()?,
            amend_library_method: raw
                .amend_library_method
                .iter()
                .map(|m| parse_method(m).map(|(flags, method)| (method, flags)))
                .collect::<Result<_>>()?,
            amend_library_field: raw
                .amend_library_field
                .iter()
                .map(|f| parse_field(f).map(|(flags, field)| (field, flags)))
                .collect::<Result<_>>()?,
        })
    }

    fn merge_into(&self, spec: &mut DesugaredLibrarySpecification) {
        for (prefix, replacement) in &self.rewrite_prefix {
            spec.rewrite_prefix
                .entry(prefix.clone())
                .or_insert_with(|| replacement.clone());
        }
        spec.dont_rewrite_prefix
            .extend(self.dont_rewrite_prefix.iter().cloned());
        for ty in &self.wrapper_conversion {
            if !spec.wrapper_conversion.contains(ty) {
                spec.wrapper_conversion.push(ty.clone());
            }
        }
        for (ty, holder) in &self.custom_conversion {
            spec.custom_conversion
                .entry(ty.clone())
                .or_insert_with(|| holder.clone());
        }
        for (name, holders) in &self.retarget_core_library_member {
            let target = spec
                .retarget_core_library_member
                .entry(name.clone())
                .or_default();
            for (from, to) in holders {
                target.entry(from.clone()).or_insert_with(|| to.clone());
            }
        }
        for (from, to) in &self.backport_core_library_member {
            spec.backport_core_library_member
                .entry(from.clone())
                .or_insert_with(|| to.clone());
        }
        for (from, to) in &self.emulate_interface {
            spec.emulate_interface
                .entry(from.clone())
                .or_insert_with(|| to.clone());
        }
        spec.dont_retarget.extend(self.dont_retarget.iter().cloned());
        spec.never_outline_api
            .extend(self.never_outline_api.iter().cloned());
        for (method, flags) in &self.amend_library_method {
            spec.amend_library_method
                .entry(method.clone())
                .or_insert(*flags);
        }
        for (field, flags) in &self.amend_library_field {
            spec.amend_library_field
                .entry(field.clone())
                .or_insert(*flags);
        }
    }
}

/// A parsed configuration covering every API level, before selecting one compilation.
#[derive(Clone, Debug, PartialEq)]
pub struct MultiApiLevelSpecification {
    /// Dialect of the source JSON
    pub dialect: SpecificationDialect,
    /// Identifier (human dialect) or version (legacy dialect)
    pub identifier: String,
    /// Minimum platform the library must be compiled against
    pub required_compilation_api_level: AndroidApiLevel,
    /// Package prefix of synthesized library classes
    pub synthesized_library_classes_package_prefix: String,
    /// See [`DesugaredLibrarySpecification::support_all_callbacks_from_library`]
    pub support_all_callbacks_from_library: bool,
    /// Flags applying to library and program compilations
    pub common_flags: BTreeMap<ApiLevelRange, FlagSet>,
    /// Flags applying to library compilations only
    pub library_flags: BTreeMap<ApiLevelRange, FlagSet>,
    /// Flags applying to program compilations only
    pub program_flags: BTreeMap<ApiLevelRange, FlagSet>,
}

impl MultiApiLevelSpecification {
    /// Parses a JSON configuration of either dialect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] for malformed JSON and [`Error::Specification`] when required
    /// dialect keys are missing or a member string cannot be parsed.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawSpecification = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    /// Parses a JSON configuration from bytes.
    ///
    /// # Errors
    ///
    /// See [`MultiApiLevelSpecification::from_json`].
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: RawSpecification = serde_json::from_slice(bytes)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSpecification) -> Result<Self> {
        let dialect = SpecificationDialect::for_version(raw.configuration_format_version);
        let identifier = match dialect {
            SpecificationDialect::Human => raw.identifier.ok_or_else(|| {
                Error::Specification("missing required key `identifier`".to_string())
            })?,
            SpecificationDialect::Legacy => {
                if !raw.common_flags.is_empty() {
                    return Err(Error::Specification(
                        "`common_flags` is not supported before configuration format version 100"
                            .to_string(),
                    ));
                }
                raw.version.or(raw.identifier).ok_or_else(|| {
                    Error::Specification("missing required key `version`".to_string())
                })?
            }
        };

        Ok(MultiApiLevelSpecification {
            dialect,
            identifier,
            required_compilation_api_level: AndroidApiLevel::new(
                raw.required_compilation_api_level,
            ),
            synthesized_library_classes_package_prefix: raw
                .synthesized_library_classes_package_prefix,
            support_all_callbacks_from_library: raw.support_all_callbacks_from_library,
            common_flags: Self::parse_flags(raw.common_flags)?,
            library_flags: Self::parse_flags(raw.library_flags)?,
            program_flags: Self::parse_flags(raw.program_flags)?,
        })
    }

    fn parse_flags(list: Vec<RawFlags>) -> Result<BTreeMap<ApiLevelRange, FlagSet>> {
        let mut result = BTreeMap::new();
        for raw in list {
            let range = ApiLevelRange::new(
                AndroidApiLevel::new(raw.api_level_below_or_equal),
                raw.api_level_greater_or_equal.map(AndroidApiLevel::new),
            );
            if result.contains_key(&range) {
                return Err(Error::Specification(format!(
                    "duplicate flag set for api level range {range}"
                )));
            }
            result.insert(range, FlagSet::parse(raw)?);
        }
        Ok(result)
    }

    /// Selects the tables for a compilation at `min_api_level`.
    ///
    /// # Arguments
    ///
    /// * `min_api_level` - Minimum API level of the compilation
    /// * `library_compilation` - True when compiling the desugared library itself
    #[must_use]
    pub fn for_compilation(
        &self,
        min_api_level: AndroidApiLevel,
        library_compilation: bool,
    ) -> DesugaredLibrarySpecification {
        let mut spec = DesugaredLibrarySpecification {
            identifier: self.identifier.clone(),
            dialect: self.dialect,
            required_compilation_api_level: self.required_compilation_api_level,
            synthesized_library_classes_package_prefix: self
                .synthesized_library_classes_package_prefix
                .clone(),
            library_compilation,
            support_all_callbacks_from_library: self.support_all_callbacks_from_library,
            ..Default::default()
        };
        let specific = if library_compilation {
            &self.library_flags
        } else {
            &self.program_flags
        };
        for flags in [&self.common_flags, specific] {
            for (range, set) in flags {
                if range.contains(min_api_level) {
                    set.merge_into(&mut spec);
                }
            }
        }
        spec
    }
}

fn parse_type_list(list: &str) -> Vec<TypeRef> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(TypeRef::new)
        .collect()
}

/// Parses `[modifiers] returnType holder.name(param, ...)`.
///
/// # Errors
///
/// Returns [`Error::Specification`] if the string does not have that shape.
pub fn parse_method(source: &str) -> Result<(MethodAccessFlags, MethodRef)> {
    let invalid = || Error::Specification(format!("cannot parse method `{source}`"));

    let (head, rest) = source.trim().split_once('(').ok_or_else(invalid)?;
    let parameters = rest.strip_suffix(')').ok_or_else(invalid)?;
    let mut tokens: Vec<&str> = head.split_whitespace().collect();
    let qualified = tokens.pop().ok_or_else(invalid)?;
    let return_type = tokens.pop().ok_or_else(invalid)?;
    let (holder, name) = qualified.rsplit_once('.').ok_or_else(invalid)?;

    let mut flags = MethodAccessFlags::empty();
    for keyword in tokens {
        flags |= MethodAccessFlags::from_keyword(keyword).ok_or_else(invalid)?;
    }

    let proto = Proto::new(TypeRef::new(return_type), parse_type_list(parameters));
    Ok((flags, MethodRef::new(TypeRef::new(holder), name, proto)))
}

/// Parses `[modifiers] type holder.name`.
///
/// # Errors
///
/// Returns [`Error::Specification`] if the string does not have that shape.
pub fn parse_field(source: &str) -> Result<(FieldAccessFlags, FieldRef)> {
    let invalid = || Error::Specification(format!("cannot parse field `{source}`"));

    let mut tokens: Vec<&str> = source.split_whitespace().collect();
    let qualified = tokens.pop().ok_or_else(invalid)?;
    let ty = tokens.pop().ok_or_else(invalid)?;
    let (holder, name) = qualified.rsplit_once('.').ok_or_else(invalid)?;

    let mut flags = FieldAccessFlags::empty();
    for keyword in tokens {
        flags |= FieldAccessFlags::from_keyword(keyword).ok_or_else(invalid)?;
    }
    Ok((
        flags,
        FieldRef::new(TypeRef::new(holder), name, TypeRef::new(ty)),
    ))
}
