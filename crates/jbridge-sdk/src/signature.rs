//! Type descriptors and method signatures
//!
//! Member lookup by name needs the exact descriptor string the runtime uses
//! to tell overloads apart. Descriptors are built here from typed
//! descriptions, and parsed back when a caller hands one in as a string.
//!
//! # Grammar
//!
//! ```text
//! field      := 'Z' | 'B' | 'C' | 'S' | 'I' | 'J' | 'F' | 'D'
//!             | 'L' class-path ';'
//!             | '[' field
//! method     := '(' field* ')' ( field | 'V' )
//! ```

use std::fmt;

use crate::error::{RuntimeError, RuntimeResult};

/// Slash-separated path of `java.lang.String`
pub const STRING_CLASS: &str = "java/lang/String";

/// Name under which constructors are resolved
pub const CONSTRUCTOR_NAME: &str = "<init>";

// ============================================================================
// JavaType
// ============================================================================

/// A field or parameter type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JavaType {
    /// `Z`
    Boolean,
    /// `B`
    Byte,
    /// `C`
    Char,
    /// `S`
    Short,
    /// `I`
    Int,
    /// `J`
    Long,
    /// `F`
    Float,
    /// `D`
    Double,
    /// `L<class>;`, class path slash separated
    Object(String),
    /// `[<element>`
    Array(Box<JavaType>),
}

impl JavaType {
    /// `java.lang.String`
    pub fn string() -> Self {
        JavaType::Object(STRING_CLASS.to_string())
    }

    /// Reference type of the given slash-separated class path
    pub fn object(class: impl Into<String>) -> Self {
        JavaType::Object(class.into())
    }

    /// Array of `element`
    pub fn array(element: JavaType) -> Self {
        JavaType::Array(Box::new(element))
    }

    /// Whether values of this type are references
    pub fn is_reference(&self) -> bool {
        matches!(self, JavaType::Object(_) | JavaType::Array(_))
    }

    /// Descriptor string, e.g. `I` or `Ljava/lang/String;`
    pub fn descriptor(&self) -> String {
        let mut out = String::new();
        self.write_descriptor(&mut out);
        out
    }

    fn write_descriptor(&self, out: &mut String) {
        match self {
            JavaType::Boolean => out.push('Z'),
            JavaType::Byte => out.push('B'),
            JavaType::Char => out.push('C'),
            JavaType::Short => out.push('S'),
            JavaType::Int => out.push('I'),
            JavaType::Long => out.push('J'),
            JavaType::Float => out.push('F'),
            JavaType::Double => out.push('D'),
            JavaType::Object(class) => {
                out.push('L');
                out.push_str(class);
                out.push(';');
            }
            JavaType::Array(element) => {
                out.push('[');
                element.write_descriptor(out);
            }
        }
    }

    /// Parse a complete field descriptor
    pub fn parse(descriptor: &str) -> RuntimeResult<Self> {
        let mut cursor = Cursor::new(descriptor);
        let ty = cursor.field()?;
        cursor.finish()?;
        Ok(ty)
    }
}

impl fmt::Display for JavaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor())
    }
}

// ============================================================================
// ReturnType
// ============================================================================

/// Return type of a method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReturnType {
    /// `V`
    Void,
    /// Any field type
    Value(JavaType),
}

impl ReturnType {
    /// Descriptor string
    pub fn descriptor(&self) -> String {
        match self {
            ReturnType::Void => "V".to_string(),
            ReturnType::Value(ty) => ty.descriptor(),
        }
    }

    /// Whether the method returns a reference
    pub fn is_reference(&self) -> bool {
        matches!(self, ReturnType::Value(ty) if ty.is_reference())
    }
}

impl From<JavaType> for ReturnType {
    fn from(ty: JavaType) -> Self {
        ReturnType::Value(ty)
    }
}

// ============================================================================
// MethodSignature
// ============================================================================

/// Parameter list plus return type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    /// Declared parameter types in order
    pub params: Vec<JavaType>,
    /// Declared return type
    pub ret: ReturnType,
}

impl MethodSignature {
    /// Create a signature
    pub fn new(params: Vec<JavaType>, ret: ReturnType) -> Self {
        Self { params, ret }
    }

    /// Descriptor string, e.g. `(ILjava/lang/String;)V`
    pub fn descriptor(&self) -> String {
        method_descriptor(&self.params, &self.ret)
    }

    /// Parse a method descriptor
    pub fn parse(descriptor: &str) -> RuntimeResult<Self> {
        let mut cursor = Cursor::new(descriptor);
        cursor.expect('(')?;
        let mut params = Vec::new();
        while cursor.peek() != Some(')') {
            params.push(cursor.field()?);
        }
        cursor.expect(')')?;
        let ret = if cursor.peek() == Some('V') {
            cursor.bump();
            ReturnType::Void
        } else {
            ReturnType::Value(cursor.field()?)
        };
        cursor.finish()?;
        Ok(Self { params, ret })
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor())
    }
}

/// Build a method descriptor from parameter and return types.
pub fn method_descriptor(params: &[JavaType], ret: &ReturnType) -> String {
    let mut out = String::with_capacity(2 + params.len() * 2);
    out.push('(');
    for param in params {
        param.write_descriptor(&mut out);
    }
    out.push(')');
    match ret {
        ReturnType::Void => out.push('V'),
        ReturnType::Value(ty) => ty.write_descriptor(&mut out),
    }
    out
}

// ============================================================================
// Parser
// ============================================================================

struct Cursor<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, reason: impl Into<String>) -> RuntimeError {
        RuntimeError::InvalidDescriptor {
            descriptor: self.source.to_string(),
            reason: reason.into(),
        }
    }

    fn expect(&mut self, want: char) -> RuntimeResult<()> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", want, c))),
            None => Err(self.error(format!("expected '{}', found end", want))),
        }
    }

    fn finish(&self) -> RuntimeResult<()> {
        if self.pos == self.source.len() {
            Ok(())
        } else {
            Err(self.error(format!("trailing input at offset {}", self.pos)))
        }
    }

    fn field(&mut self) -> RuntimeResult<JavaType> {
        let ty = match self.bump() {
            Some('Z') => JavaType::Boolean,
            Some('B') => JavaType::Byte,
            Some('C') => JavaType::Char,
            Some('S') => JavaType::Short,
            Some('I') => JavaType::Int,
            Some('J') => JavaType::Long,
            Some('F') => JavaType::Float,
            Some('D') => JavaType::Double,
            Some('L') => {
                let rest = &self.source[self.pos..];
                let end = rest
                    .find(';')
                    .ok_or_else(|| self.error("unterminated class name"))?;
                if end == 0 {
                    return Err(self.error("empty class name"));
                }
                let class = rest[..end].to_string();
                self.pos += end + 1;
                JavaType::Object(class)
            }
            Some('[') => JavaType::Array(Box::new(self.field()?)),
            Some(c) => return Err(self.error(format!("unknown type code '{}'", c))),
            None => return Err(self.error("unexpected end")),
        };
        Ok(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_descriptors() {
        assert_eq!(JavaType::Boolean.descriptor(), "Z");
        assert_eq!(JavaType::Long.descriptor(), "J");
        assert_eq!(JavaType::Double.descriptor(), "D");
    }

    #[test]
    fn test_reference_descriptors() {
        assert_eq!(JavaType::string().descriptor(), "Ljava/lang/String;");
        assert_eq!(
            JavaType::array(JavaType::array(JavaType::Int)).descriptor(),
            "[[I"
        );
        assert_eq!(
            JavaType::array(JavaType::object("a/b/C")).descriptor(),
            "[La/b/C;"
        );
    }

    #[test]
    fn test_method_descriptor() {
        assert_eq!(method_descriptor(&[], &ReturnType::Void), "()V");
        assert_eq!(
            method_descriptor(&[JavaType::Int], &ReturnType::Value(JavaType::Float)),
            "(I)F"
        );
        let five = vec![JavaType::string(); 5];
        assert_eq!(
            method_descriptor(&five, &ReturnType::Void),
            "(Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;)V"
        );
    }

    #[test]
    fn test_parse_method() {
        let sig = MethodSignature::parse("(IJLa/b/C;[Z)Ljava/lang/String;").unwrap();
        assert_eq!(
            sig.params,
            vec![
                JavaType::Int,
                JavaType::Long,
                JavaType::object("a/b/C"),
                JavaType::array(JavaType::Boolean),
            ]
        );
        assert_eq!(sig.ret, ReturnType::Value(JavaType::string()));
        assert_eq!(sig.descriptor(), "(IJLa/b/C;[Z)Ljava/lang/String;");
    }

    #[test]
    fn test_parse_void() {
        let sig = MethodSignature::parse("()V").unwrap();
        assert!(sig.params.is_empty());
        assert_eq!(sig.ret, ReturnType::Void);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(MethodSignature::parse("").is_err());
        assert!(MethodSignature::parse("(I").is_err());
        assert!(MethodSignature::parse("(Q)V").is_err());
        assert!(MethodSignature::parse("(La/b/C)V").is_err());
        assert!(MethodSignature::parse("()VV").is_err());
        assert!(MethodSignature::parse("(V)V").is_err());
        assert!(JavaType::parse("L;").is_err());
        assert!(JavaType::parse("[").is_err());
    }

    #[test]
    fn test_parse_field() {
        assert_eq!(JavaType::parse("I").unwrap(), JavaType::Int);
        assert_eq!(JavaType::parse("[Ljava/lang/String;").unwrap(), JavaType::array(JavaType::string()));
    }

    #[test]
    fn test_error_message() {
        let err = MethodSignature::parse("(Q)V").unwrap_err();
        assert!(err.to_string().contains("unknown type code 'Q'"));
    }
}
