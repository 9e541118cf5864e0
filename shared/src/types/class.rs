//! Class descriptors
//!
//! A deserializer that has no runtime reflection still needs to tell a filter
//! *what* it is about to materialize. [`SerialClass`] carries exactly the facts
//! the filters look at: the binary class name, the owning module, whether the
//! type is an array (and of what) and whether it is primitive.
//!
//! Text form, accepted by [`str::parse`] and produced by `Display`:
//!
//! - `int`, `long`, ... primitive keywords
//! - `com.acme.Widget`, optionally prefixed by a module: `java.base/java.lang.String`
//! - array descriptors: `[I`, `[[J`, `[Lcom.acme.Widget;`
//! - source-style arrays: `com.acme.Widget[]`, `int[][]`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Module that owns the primitive types.
pub const PRIMITIVE_MODULE: &str = "java.base";

/// Package reported for primitive types.
const PRIMITIVE_PACKAGE: &str = "java.lang";

/// The eight primitive value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl Primitive {
    pub const ALL: [Primitive; 8] = [
        Primitive::Boolean,
        Primitive::Byte,
        Primitive::Char,
        Primitive::Short,
        Primitive::Int,
        Primitive::Long,
        Primitive::Float,
        Primitive::Double,
    ];

    /// Source keyword (`int`)
    pub fn keyword(self) -> &'static str {
        match self {
            Primitive::Boolean => "boolean",
            Primitive::Byte => "byte",
            Primitive::Char => "char",
            Primitive::Short => "short",
            Primitive::Int => "int",
            Primitive::Long => "long",
            Primitive::Float => "float",
            Primitive::Double => "double",
        }
    }

    /// Single-letter descriptor code (`I`)
    pub fn descriptor(self) -> char {
        match self {
            Primitive::Boolean => 'Z',
            Primitive::Byte => 'B',
            Primitive::Char => 'C',
            Primitive::Short => 'S',
            Primitive::Int => 'I',
            Primitive::Long => 'J',
            Primitive::Float => 'F',
            Primitive::Double => 'D',
        }
    }

    pub fn from_keyword(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.keyword() == s)
    }

    pub fn from_descriptor(c: char) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.descriptor() == c)
    }
}

/// Errors produced while parsing the text form of a class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassParseError {
    #[error("class name is empty")]
    Empty,

    #[error("module name is empty in \"{0}\"")]
    EmptyModule(String),

    #[error("invalid array descriptor \"{0}\"")]
    InvalidDescriptor(String),

    #[error("invalid class name \"{0}\"")]
    InvalidName(String),

    #[error("primitive type cannot belong to module \"{0}\"")]
    ModuleOnPrimitive(String),
}

/// A type the deserializer is about to materialize.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SerialClass {
    /// A primitive value type such as `int`
    Primitive(Primitive),

    /// A named class or interface
    Named {
        /// Fully qualified binary name (`com.acme.Widget`, `com.acme.Outer$Inner`)
        name: String,
        /// Name of the module the class belongs to, if any
        module: Option<String>,
    },

    /// An array of the component type
    Array(Box<SerialClass>),
}

impl SerialClass {
    /// A named class outside of any module.
    pub fn named(name: impl Into<String>) -> Self {
        SerialClass::Named {
            name: name.into(),
            module: None,
        }
    }

    /// A named class belonging to `module`.
    pub fn in_module(module: impl Into<String>, name: impl Into<String>) -> Self {
        SerialClass::Named {
            name: name.into(),
            module: Some(module.into()),
        }
    }

    pub fn primitive(kind: Primitive) -> Self {
        SerialClass::Primitive(kind)
    }

    /// An array of `component`.
    pub fn array_of(component: SerialClass) -> Self {
        SerialClass::Array(Box::new(component))
    }

    /// Wrap this type in `dimensions` levels of array.
    pub fn with_dimensions(self, dimensions: usize) -> Self {
        (0..dimensions).fold(self, |c, _| SerialClass::array_of(c))
    }

    /// Fully qualified binary name.
    ///
    /// Arrays use the descriptor form, so `int[][]` is `[[I` and
    /// `Widget[]` is `[Lcom.acme.Widget;`.
    pub fn qualified_name(&self) -> String {
        match self {
            SerialClass::Primitive(p) => p.keyword().to_string(),
            SerialClass::Named { name, .. } => name.clone(),
            SerialClass::Array(component) => format!("[{}", component.descriptor()),
        }
    }

    fn descriptor(&self) -> String {
        match self {
            SerialClass::Primitive(p) => p.descriptor().to_string(),
            SerialClass::Named { name, .. } => format!("L{};", name),
            SerialClass::Array(component) => format!("[{}", component.descriptor()),
        }
    }

    /// Module of the type. Arrays report the module of their base component.
    pub fn module_name(&self) -> Option<&str> {
        match self.base_component() {
            SerialClass::Primitive(_) => Some(PRIMITIVE_MODULE),
            SerialClass::Named { module, .. } => module.as_deref(),
            SerialClass::Array(_) => None,
        }
    }

    /// Package name; empty for the default package.
    pub fn package_name(&self) -> &str {
        match self.base_component() {
            SerialClass::Primitive(_) => PRIMITIVE_PACKAGE,
            SerialClass::Named { name, .. } => name.rfind('.').map_or("", |i| &name[..i]),
            SerialClass::Array(_) => "",
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, SerialClass::Array(_))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, SerialClass::Primitive(_))
    }

    /// Component type of an array, `None` for anything else.
    pub fn component_type(&self) -> Option<&SerialClass> {
        match self {
            SerialClass::Array(component) => Some(component),
            _ => None,
        }
    }

    /// Strip every array dimension. Non-array types return themselves.
    pub fn base_component(&self) -> &SerialClass {
        let mut class = self;
        while let SerialClass::Array(component) = class {
            class = component;
        }
        class
    }

    /// Number of array dimensions (0 for non-arrays).
    pub fn dimensions(&self) -> usize {
        let mut dims = 0;
        let mut class = self;
        while let SerialClass::Array(component) = class {
            dims += 1;
            class = component;
        }
        dims
    }

    fn attach_module(self, module: &str) -> Result<Self, ClassParseError> {
        match self {
            SerialClass::Primitive(_) => Err(ClassParseError::ModuleOnPrimitive(module.to_string())),
            SerialClass::Named { name, .. } => Ok(SerialClass::in_module(module, name)),
            SerialClass::Array(component) => {
                Ok(SerialClass::array_of(component.attach_module(module)?))
            }
        }
    }
}

impl fmt::Display for SerialClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let SerialClass::Named {
            module: Some(module),
            ..
        } = self.base_component()
        {
            write!(f, "{}/", module)?;
        }
        f.write_str(&self.qualified_name())
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.ends_with('.')
        && !name.contains("..")
        && !name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | ';' | '[' | ']'))
}

fn parse_named(text: &str) -> Result<SerialClass, ClassParseError> {
    if let Some(component) = text.strip_suffix("[]") {
        return Ok(SerialClass::array_of(parse_named(component)?));
    }
    if let Some(p) = Primitive::from_keyword(text) {
        return Ok(SerialClass::Primitive(p));
    }
    if !valid_name(text) {
        return Err(ClassParseError::InvalidName(text.to_string()));
    }
    Ok(SerialClass::named(text))
}

fn parse_descriptor(text: &str) -> Result<SerialClass, ClassParseError> {
    let dims = text.chars().take_while(|&c| c == '[').count();
    let element = &text[dims..];
    let invalid = || ClassParseError::InvalidDescriptor(text.to_string());

    let base = if let Some(name) = element.strip_prefix('L') {
        let name = name.strip_suffix(';').ok_or_else(invalid)?;
        if !valid_name(name) {
            return Err(invalid());
        }
        SerialClass::named(name)
    } else {
        let mut chars = element.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Primitive::from_descriptor(c)
                .map(SerialClass::Primitive)
                .ok_or_else(invalid)?,
            _ => return Err(invalid()),
        }
    };
    Ok(base.with_dimensions(dims))
}

impl FromStr for SerialClass {
    type Err = ClassParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ClassParseError::Empty);
        }
        let (module, rest) = match s.split_once('/') {
            Some(("", _)) => return Err(ClassParseError::EmptyModule(s.to_string())),
            Some((module, rest)) => (Some(module), rest),
            None => (None, s),
        };
        if rest.is_empty() {
            return Err(ClassParseError::Empty);
        }
        let class = if rest.starts_with('[') {
            parse_descriptor(rest)?
        } else {
            parse_named(rest)?
        };
        match module {
            Some(module) => class.attach_module(module),
            None => Ok(class),
        }
    }
}

impl TryFrom<String> for SerialClass {
    type Error = ClassParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SerialClass> for String {
    fn from(class: SerialClass) -> Self {
        class.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_names() {
        let widget = SerialClass::named("com.acme.Widget");
        assert_eq!(widget.qualified_name(), "com.acme.Widget");
        assert_eq!(
            widget.clone().with_dimensions(1).qualified_name(),
            "[Lcom.acme.Widget;"
        );
        assert_eq!(
            SerialClass::primitive(Primitive::Int)
                .with_dimensions(2)
                .qualified_name(),
            "[[I"
        );
        assert_eq!(SerialClass::primitive(Primitive::Long).qualified_name(), "long");
    }

    #[test]
    fn test_package_and_module() {
        let s = SerialClass::in_module("java.base", "java.lang.String");
        assert_eq!(s.package_name(), "java.lang");
        assert_eq!(s.module_name(), Some("java.base"));

        let arr = s.with_dimensions(3);
        assert_eq!(arr.package_name(), "java.lang");
        assert_eq!(arr.module_name(), Some("java.base"));
        assert_eq!(arr.dimensions(), 3);

        let default_pkg = SerialClass::named("Toplevel");
        assert_eq!(default_pkg.package_name(), "");
        assert_eq!(default_pkg.module_name(), None);

        let int = SerialClass::primitive(Primitive::Int);
        assert_eq!(int.module_name(), Some(PRIMITIVE_MODULE));
        assert_eq!(int.package_name(), "java.lang");
    }

    #[test]
    fn test_component_type_and_base() {
        let arr = SerialClass::named("a.B").with_dimensions(2);
        assert!(arr.is_array());
        let inner = arr.component_type().unwrap();
        assert!(inner.is_array());
        assert_eq!(arr.base_component(), &SerialClass::named("a.B"));
        assert!(SerialClass::named("a.B").component_type().is_none());
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(
            "int".parse::<SerialClass>().unwrap(),
            SerialClass::primitive(Primitive::Int)
        );
        assert_eq!(
            "java.base/java.lang.String".parse::<SerialClass>().unwrap(),
            SerialClass::in_module("java.base", "java.lang.String")
        );
        assert_eq!(
            "[[J".parse::<SerialClass>().unwrap(),
            SerialClass::primitive(Primitive::Long).with_dimensions(2)
        );
        assert_eq!(
            "[Lcom.acme.Widget;".parse::<SerialClass>().unwrap(),
            SerialClass::named("com.acme.Widget").with_dimensions(1)
        );
        assert_eq!(
            "app/com.acme.Widget[][]".parse::<SerialClass>().unwrap(),
            SerialClass::in_module("app", "com.acme.Widget").with_dimensions(2)
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<SerialClass>(), Err(ClassParseError::Empty));
        assert!(matches!(
            "/a.B".parse::<SerialClass>(),
            Err(ClassParseError::EmptyModule(_))
        ));
        assert!(matches!(
            "[Q".parse::<SerialClass>(),
            Err(ClassParseError::InvalidDescriptor(_))
        ));
        assert!(matches!(
            "[Lcom.acme.Widget".parse::<SerialClass>(),
            Err(ClassParseError::InvalidDescriptor(_))
        ));
        assert!(matches!(
            "com..acme".parse::<SerialClass>(),
            Err(ClassParseError::InvalidName(_))
        ));
        assert!(matches!(
            "java.base/int".parse::<SerialClass>(),
            Err(ClassParseError::ModuleOnPrimitive(_))
        ));
    }

    #[test]
    fn test_display_parses_back() {
        let class = SerialClass::in_module("app", "com.acme.Widget").with_dimensions(1);
        assert_eq!(class.to_string(), "app/[Lcom.acme.Widget;");
        assert_eq!(class.to_string().parse::<SerialClass>().unwrap(), class);
    }

    #[test]
    fn test_serde_uses_text_form() {
        let class = SerialClass::named("com.acme.Widget");
        let json = serde_json::to_string(&class).unwrap();
        assert_eq!(json, "\"com.acme.Widget\"");
        let bad: Result<SerialClass, _> = serde_json::from_str("\"[X\"");
        assert!(bad.is_err());
    }
}
