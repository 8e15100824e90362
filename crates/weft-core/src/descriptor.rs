//! Type descriptors and call signatures
//!
//! A [`TypeDescriptor`] is the reflection-like metadata a managed type
//! publishes: its fully-qualified name (`\`-separated), the methods it
//! declares with their visibility, and the properties that may be read or
//! written through a proxy. A [`Signature`] is the fully-qualified form of
//! one call, which pointcuts are resolved against.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::error::{AspectError, AspectResult};

/// Path separator used in type and function names
pub const PATH_SEPARATOR: char = '\\';

/// Declared visibility of a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    /// Callable from anywhere
    #[default]
    Public,
    /// Callable from the type and its subtypes
    Protected,
    /// Callable from the type only
    Private,
}

impl Visibility {
    /// All visibility keywords, in declaration order
    pub const ALL: [Visibility; 3] = [Visibility::Public, Visibility::Protected, Visibility::Private];

    /// Keyword used in pointcuts
    pub fn keyword(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        }
    }

    /// Parse a visibility keyword (`public`, `protected`, `private`)
    pub fn from_keyword(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.keyword() == s)
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Method metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    /// Method name
    pub name: String,
    /// Declared visibility
    pub visibility: Visibility,
    /// Whether the method is static (`::` form)
    pub is_static: bool,
}

impl MethodInfo {
    /// Create instance method metadata
    pub fn new(name: &str, visibility: Visibility) -> Self {
        Self {
            name: name.to_string(),
            visibility,
            is_static: false,
        }
    }

    /// Create static method metadata
    pub fn new_static(name: &str, visibility: Visibility) -> Self {
        Self {
            name: name.to_string(),
            visibility,
            is_static: true,
        }
    }
}

/// Reflection metadata for a managed type
#[derive(Debug, Clone, Default)]
pub struct TypeDescriptor {
    name: String,
    methods: Vec<MethodInfo>,
    method_indices: FxHashMap<String, usize>,
    properties: Vec<String>,
}

impl TypeDescriptor {
    /// Create an empty descriptor for a fully-qualified type name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.trim_start_matches(PATH_SEPARATOR).to_string(),
            ..Self::default()
        }
    }

    /// Add a public instance method
    pub fn with_method(self, name: &str) -> Self {
        self.with_method_info(MethodInfo::new(name, Visibility::Public))
    }

    /// Add an instance method with an explicit visibility
    pub fn with_method_visibility(self, name: &str, visibility: Visibility) -> Self {
        self.with_method_info(MethodInfo::new(name, visibility))
    }

    /// Add a public static method
    pub fn with_static_method(self, name: &str) -> Self {
        self.with_method_info(MethodInfo::new_static(name, Visibility::Public))
    }

    /// Add a method; a later entry with the same name replaces the earlier one
    pub fn with_method_info(mut self, info: MethodInfo) -> Self {
        match self.method_indices.get(&info.name) {
            Some(&index) => self.methods[index] = info,
            None => {
                self.method_indices.insert(info.name.clone(), self.methods.len());
                self.methods.push(info);
            }
        }
        self
    }

    /// Add a property
    pub fn with_property(mut self, name: &str) -> Self {
        if !self.has_property(name) {
            self.properties.push(name.to_string());
        }
        self
    }

    /// Fully-qualified type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace part of the type name (empty for unqualified types)
    pub fn namespace(&self) -> &str {
        split_last_separator(&self.name).0
    }

    /// Bare type name without namespace
    pub fn short_name(&self) -> &str {
        split_last_separator(&self.name).1
    }

    /// Look up a method by name
    pub fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.method_indices.get(name).map(|&i| &self.methods[i])
    }

    /// Check if a method exists
    pub fn has_method(&self, name: &str) -> bool {
        self.method_indices.contains_key(name)
    }

    /// Check if a property exists
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.iter().any(|p| p == name)
    }

    /// Declared methods in declaration order
    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    /// Declared properties in declaration order
    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    /// Signature of a call to one of this type's methods
    pub fn signature(&self, method: &str) -> Option<Signature> {
        let info = self.method(method)?;
        Some(Signature {
            namespace: self.namespace().to_string(),
            class: self.short_name().to_string(),
            method: info.name.clone(),
            kind: if info.is_static {
                CallKind::Static
            } else {
                CallKind::Instance
            },
            visibility: info.visibility,
        })
    }
}

/// How a call reaches its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// `Class->method()`
    Instance,
    /// `Class::method()`
    Static,
    /// `function()`
    Function,
}

impl CallKind {
    /// Operator between class and method, if any
    pub fn operator(&self) -> &'static str {
        match self {
            CallKind::Instance => "->",
            CallKind::Static => "::",
            CallKind::Function => "",
        }
    }
}

/// Fully-qualified call signature, without arguments
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    /// Namespace path (`Shop\Billing`), empty when unqualified
    pub namespace: String,
    /// Class name, empty for free functions
    pub class: String,
    /// Method or function name
    pub method: String,
    /// Call form
    pub kind: CallKind,
    /// Declared visibility of the target
    pub visibility: Visibility,
}

impl Signature {
    /// Signature of a free function
    pub fn function(path: &str) -> Self {
        let (namespace, name) = split_last_separator(path.trim_start_matches(PATH_SEPARATOR));
        Self {
            namespace: namespace.to_string(),
            class: String::new(),
            method: name.to_string(),
            kind: CallKind::Function,
            visibility: Visibility::Public,
        }
    }

    /// Parse `Ns\Class->m()`, `Ns\Class::m()` or `f()`; visibility defaults to public
    pub fn parse(s: &str) -> AspectResult<Self> {
        let malformed = || AspectError::MalformedSignature(s.to_string());
        let text = s.trim().trim_start_matches(PATH_SEPARATOR);
        let body = text.strip_suffix("()").ok_or_else(malformed)?;

        let (owner, method, kind) = match find_operator(body) {
            Some((pos, kind)) => {
                let (namespace, class) = split_last_separator(&body[..pos]);
                (Some((namespace, class)), &body[pos + 2..], kind)
            }
            None => (None, body, CallKind::Function),
        };

        let sig = match owner {
            Some((namespace, class)) => Self {
                namespace: namespace.to_string(),
                class: class.to_string(),
                method: method.to_string(),
                kind,
                visibility: Visibility::Public,
            },
            None => Self::function(method),
        };

        let namespace_ok =
            sig.namespace.is_empty() || sig.namespace.split(PATH_SEPARATOR).all(is_identifier);
        let class_ok = kind == CallKind::Function || is_identifier(&sig.class);
        if !namespace_ok || !class_ok || !is_identifier(&sig.method) {
            return Err(malformed());
        }
        Ok(sig)
    }

    /// Replace the declared visibility
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Right-hand part after the last path separator: `Class->m()` or `f()`
    pub fn name_part(&self) -> String {
        format!("{}{}{}()", self.class, self.kind.operator(), self.method)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.namespace.is_empty() {
            write!(f, "{}{}", self.namespace, PATH_SEPARATOR)?;
        }
        write!(f, "{}", self.name_part())
    }
}

/// Split on the last path separator; the left side is empty when there is none
pub(crate) fn split_last_separator(s: &str) -> (&str, &str) {
    match s.rfind(PATH_SEPARATOR) {
        Some(pos) => (&s[..pos], &s[pos + 1..]),
        None => ("", s),
    }
}

/// Locate the last `->` or `::` operator
pub(crate) fn find_operator(s: &str) -> Option<(usize, CallKind)> {
    let arrow = s.rfind("->").map(|p| (p, CallKind::Instance));
    let colons = s.rfind("::").map(|p| (p, CallKind::Static));
    match (arrow, colons) {
        (Some(a), Some(c)) => Some(if a.0 > c.0 { a } else { c }),
        (a, c) => a.or(c),
    }
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
