//! Minimal class-file decoder.
//!
//! Reads just enough of the JVM class-file format to list the declared
//! methods of a class together with the annotations attached to them and the
//! first source line of their bytecode. Nothing is verified or linked beyond
//! what is needed to walk the structure; fields, interfaces and class-level
//! attributes are skipped by length.

use std::fmt;
use thiserror::Error;

const MAGIC: u32 = 0xCAFE_BABE;
const MAX_NESTING: usize = 64;

const RUNTIME_VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";
const RUNTIME_INVISIBLE_ANNOTATIONS: &str = "RuntimeInvisibleAnnotations";
const CODE: &str = "Code";
const LINE_NUMBER_TABLE: &str = "LineNumberTable";

#[derive(Debug, Error)]
pub enum ClassFileError {
    #[error("not a class file (magic {0:#010x})")]
    BadMagic(u32),
    #[error("unexpected end of data at offset {offset} (needed {needed} more bytes)")]
    Truncated { offset: usize, needed: usize },
    #[error("unknown constant pool tag {tag} at offset {offset}")]
    UnknownConstantTag { tag: u8, offset: usize },
    #[error("constant pool index {0} is out of range")]
    BadConstantIndex(u16),
    #[error("constant pool entry {index} is not a {expected} entry")]
    UnexpectedConstant { index: u16, expected: &'static str },
    #[error("invalid modified UTF-8 in constant pool")]
    InvalidUtf8,
    #[error("invalid type descriptor `{0}`")]
    InvalidDescriptor(String),
    #[error("unknown annotation element tag {0:#04x}")]
    BadElementTag(u8),
    #[error("annotation values nested deeper than 64 levels")]
    NestingTooDeep,
}

type Result<T> = std::result::Result<T, ClassFileError>;

#[derive(Debug, Clone)]
pub struct ClassFile {
    /// Dotted, fully-qualified class name.
    pub name: String,
    pub methods: Vec<MethodInfo>,
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub name: String,
    /// First source line of the method body, 0 when unknown.
    pub line_number: u32,
    /// Visible and invisible annotations, in attribute order.
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Dotted, fully-qualified annotation type name.
    pub type_name: String,
    pub members: Vec<(String, ElementValue)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    Byte(i32),
    Char(char),
    Double(f64),
    Float(f32),
    Int(i32),
    Long(i64),
    Short(i32),
    Boolean(bool),
    String(String),
    Enum { type_name: String, const_name: String },
    Class(String),
    Annotation(Annotation),
    Array(Vec<ElementValue>),
}

impl fmt::Display for ElementValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementValue::Byte(v) | ElementValue::Int(v) | ElementValue::Short(v) => {
                write!(f, "{v}")
            }
            ElementValue::Char(c) => write!(f, "{c}"),
            ElementValue::Double(v) => write!(f, "{v:?}"),
            ElementValue::Float(v) => write!(f, "{v:?}"),
            ElementValue::Long(v) => write!(f, "{v}"),
            ElementValue::Boolean(v) => write!(f, "{v}"),
            ElementValue::String(s) => write!(f, "\"{s}\""),
            ElementValue::Enum {
                type_name,
                const_name,
            } => write!(f, "{type_name}.{const_name}"),
            ElementValue::Class(name) => write!(f, "{name}.class"),
            ElementValue::Annotation(a) => write!(f, "{a}"),
            ElementValue::Array(values) => {
                f.write_str("{")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.type_name)?;
        if self.members.is_empty() {
            return Ok(());
        }
        f.write_str("(")?;
        for (i, (name, value)) in self.members.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str(")")
    }
}

pub fn parse_class(bytes: &[u8]) -> Result<ClassFile> {
    let mut r = Reader::new(bytes);

    let magic = r.u4()?;
    if magic != MAGIC {
        return Err(ClassFileError::BadMagic(magic));
    }
    r.skip(4)?; // minor_version, major_version

    let pool = ConstantPool::read(&mut r)?;

    r.skip(2)?; // access_flags
    let this_class = r.u2()?;
    let name = pool.class_name(this_class)?.replace('/', ".");
    r.skip(2)?; // super_class

    let interfaces = r.u2()?;
    r.skip(usize::from(interfaces) * 2)?;

    let fields = r.u2()?;
    for _ in 0..fields {
        r.skip(6)?;
        skip_attributes(&mut r)?;
    }

    let method_count = r.u2()?;
    let mut methods = Vec::with_capacity(usize::from(method_count));
    for _ in 0..method_count {
        methods.push(read_method(&mut r, &pool)?);
    }

    skip_attributes(&mut r)?;

    Ok(ClassFile { name, methods })
}

/// Convert a field descriptor (`Lcom/foo/Bar;`, `I`, `[J`) into a Java type name.
pub fn descriptor_to_type_name(descriptor: &str) -> Result<String> {
    let dims = descriptor.bytes().take_while(|b| *b == b'[').count();
    let element = &descriptor[dims..];

    let base = match element.as_bytes().first() {
        Some(b'L') if element.len() > 2 && element.ends_with(';') => {
            element[1..element.len() - 1].replace('/', ".")
        }
        Some(b) if element.len() == 1 => match *b {
            b'B' => "byte".to_string(),
            b'C' => "char".to_string(),
            b'D' => "double".to_string(),
            b'F' => "float".to_string(),
            b'I' => "int".to_string(),
            b'J' => "long".to_string(),
            b'S' => "short".to_string(),
            b'Z' => "boolean".to_string(),
            b'V' if dims == 0 => "void".to_string(),
            _ => return Err(ClassFileError::InvalidDescriptor(descriptor.to_string())),
        },
        _ => return Err(ClassFileError::InvalidDescriptor(descriptor.to_string())),
    };

    Ok(format!("{base}{}", "[]".repeat(dims)))
}

fn read_method(r: &mut Reader<'_>, pool: &ConstantPool) -> Result<MethodInfo> {
    r.skip(2)?; // access_flags
    let name = pool.utf8(r.u2()?)?.to_string();
    r.skip(2)?; // descriptor_index

    let mut line_number = 0;
    let mut annotations = Vec::new();

    let count = r.u2()?;
    for _ in 0..count {
        let attr_name = pool.utf8(r.u2()?)?;
        let len = r.u4()? as usize;
        let data = r.take(len)?;

        match attr_name {
            RUNTIME_VISIBLE_ANNOTATIONS | RUNTIME_INVISIBLE_ANNOTATIONS => {
                let mut inner = Reader::new(data);
                let n = inner.u2()?;
                for _ in 0..n {
                    annotations.push(read_annotation(&mut inner, pool, 0)?);
                }
            }
            CODE => {
                if let Some(line) = first_line(data, pool)? {
                    line_number = u32::from(line);
                }
            }
            _ => {}
        }
    }

    Ok(MethodInfo {
        name,
        line_number,
        annotations,
    })
}

/// Line of the LineNumberTable entry with the lowest start_pc.
fn first_line(code: &[u8], pool: &ConstantPool) -> Result<Option<u16>> {
    let mut r = Reader::new(code);
    r.skip(4)?; // max_stack, max_locals
    let code_len = r.u4()? as usize;
    r.skip(code_len)?;
    let exceptions = r.u2()?;
    r.skip(usize::from(exceptions) * 8)?;

    let mut best: Option<(u16, u16)> = None;
    let count = r.u2()?;
    for _ in 0..count {
        let attr_name = pool.utf8(r.u2()?)?;
        let len = r.u4()? as usize;
        let data = r.take(len)?;
        if attr_name != LINE_NUMBER_TABLE {
            continue;
        }

        let mut table = Reader::new(data);
        let entries = table.u2()?;
        for _ in 0..entries {
            let start_pc = table.u2()?;
            let line = table.u2()?;
            if best.is_none_or(|(pc, _)| start_pc < pc) {
                best = Some((start_pc, line));
            }
        }
    }

    Ok(best.map(|(_, line)| line))
}

fn read_annotation(r: &mut Reader<'_>, pool: &ConstantPool, depth: usize) -> Result<Annotation> {
    if depth > MAX_NESTING {
        return Err(ClassFileError::NestingTooDeep);
    }

    let type_name = descriptor_to_type_name(pool.utf8(r.u2()?)?)?;
    let pairs = r.u2()?;
    let mut members = Vec::with_capacity(usize::from(pairs));
    for _ in 0..pairs {
        let name = pool.utf8(r.u2()?)?.to_string();
        let value = read_element_value(r, pool, depth + 1)?;
        members.push((name, value));
    }

    Ok(Annotation { type_name, members })
}

fn read_element_value(r: &mut Reader<'_>, pool: &ConstantPool, depth: usize) -> Result<ElementValue> {
    if depth > MAX_NESTING {
        return Err(ClassFileError::NestingTooDeep);
    }

    let tag = r.u1()?;
    let value = match tag {
        b'B' => ElementValue::Byte(pool.integer(r.u2()?)?),
        b'C' => {
            let code = pool.integer(r.u2()?)?;
            ElementValue::Char(
                char::from_u32(code as u32).unwrap_or(char::REPLACEMENT_CHARACTER),
            )
        }
        b'D' => ElementValue::Double(pool.double(r.u2()?)?),
        b'F' => ElementValue::Float(pool.float(r.u2()?)?),
        b'I' => ElementValue::Int(pool.integer(r.u2()?)?),
        b'J' => ElementValue::Long(pool.long(r.u2()?)?),
        b'S' => ElementValue::Short(pool.integer(r.u2()?)?),
        b'Z' => ElementValue::Boolean(pool.integer(r.u2()?)? != 0),
        b's' => ElementValue::String(pool.utf8(r.u2()?)?.to_string()),
        b'e' => {
            let type_name = descriptor_to_type_name(pool.utf8(r.u2()?)?)?;
            let const_name = pool.utf8(r.u2()?)?.to_string();
            ElementValue::Enum {
                type_name,
                const_name,
            }
        }
        b'c' => ElementValue::Class(descriptor_to_type_name(pool.utf8(r.u2()?)?)?),
        b'@' => ElementValue::Annotation(read_annotation(r, pool, depth)?),
        b'[' => {
            let n = r.u2()?;
            let mut values = Vec::with_capacity(usize::from(n));
            for _ in 0..n {
                values.push(read_element_value(r, pool, depth + 1)?);
            }
            ElementValue::Array(values)
        }
        other => return Err(ClassFileError::BadElementTag(other)),
    };
    Ok(value)
}

fn skip_attributes(r: &mut Reader<'_>) -> Result<()> {
    let count = r.u2()?;
    for _ in 0..count {
        r.skip(2)?;
        let len = r.u4()? as usize;
        r.skip(len)?;
    }
    Ok(())
}

#[derive(Debug)]
enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    /// Entries this decoder never dereferences, plus the unusable slots
    /// (index 0 and the upper half of long/double entries).
    Other,
}

#[derive(Debug)]
struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    fn read(r: &mut Reader<'_>) -> Result<Self> {
        let count = r.u2()?;
        let mut entries = Vec::with_capacity(usize::from(count));
        entries.push(Constant::Other);

        while entries.len() < usize::from(count) {
            let offset = r.pos;
            let tag = r.u1()?;
            let (constant, wide) = match tag {
                1 => {
                    let len = usize::from(r.u2()?);
                    (Constant::Utf8(decode_modified_utf8(r.take(len)?)?), false)
                }
                3 => (Constant::Integer(r.u4()? as i32), false),
                4 => (Constant::Float(f32::from_bits(r.u4()?)), false),
                5 => (Constant::Long(r.u8()? as i64), true),
                6 => (Constant::Double(f64::from_bits(r.u8()?)), true),
                7 => (Constant::Class(r.u2()?), false),
                8 | 16 | 19 | 20 => {
                    r.skip(2)?;
                    (Constant::Other, false)
                }
                9 | 10 | 11 | 12 | 17 | 18 => {
                    r.skip(4)?;
                    (Constant::Other, false)
                }
                15 => {
                    r.skip(3)?;
                    (Constant::Other, false)
                }
                tag => return Err(ClassFileError::UnknownConstantTag { tag, offset }),
            };
            entries.push(constant);
            if wide {
                entries.push(Constant::Other);
            }
        }

        Ok(Self { entries })
    }

    fn get(&self, index: u16) -> Result<&Constant> {
        self.entries
            .get(usize::from(index))
            .ok_or(ClassFileError::BadConstantIndex(index))
    }

    fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Utf8(s) => Ok(s),
            _ => Err(ClassFileError::UnexpectedConstant {
                index,
                expected: "Utf8",
            }),
        }
    }

    fn class_name(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Class(name_index) => self.utf8(*name_index),
            _ => Err(ClassFileError::UnexpectedConstant {
                index,
                expected: "Class",
            }),
        }
    }

    fn integer(&self, index: u16) -> Result<i32> {
        match self.get(index)? {
            Constant::Integer(v) => Ok(*v),
            _ => Err(ClassFileError::UnexpectedConstant {
                index,
                expected: "Integer",
            }),
        }
    }

    fn float(&self, index: u16) -> Result<f32> {
        match self.get(index)? {
            Constant::Float(v) => Ok(*v),
            _ => Err(ClassFileError::UnexpectedConstant {
                index,
                expected: "Float",
            }),
        }
    }

    fn long(&self, index: u16) -> Result<i64> {
        match self.get(index)? {
            Constant::Long(v) => Ok(*v),
            _ => Err(ClassFileError::UnexpectedConstant {
                index,
                expected: "Long",
            }),
        }
    }

    fn double(&self, index: u16) -> Result<f64> {
        match self.get(index)? {
            Constant::Double(v) => Ok(*v),
            _ => Err(ClassFileError::UnexpectedConstant {
                index,
                expected: "Double",
            }),
        }
    }
}

/// Decode the JVM's "modified UTF-8": NUL is `C0 80` and characters outside
/// the BMP are stored as two encoded surrogates.
fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    if bytes.is_ascii() {
        return Ok(bytes.iter().map(|&b| char::from(b)).collect());
    }

    let continuation = |i: usize| -> Result<u16> {
        match bytes.get(i) {
            Some(b) if b & 0xC0 == 0x80 => Ok(u16::from(b & 0x3F)),
            _ => Err(ClassFileError::InvalidUtf8),
        }
    };

    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            units.push(u16::from(b));
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            units.push((u16::from(b & 0x1F) << 6) | continuation(i + 1)?);
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            units.push(
                (u16::from(b & 0x0F) << 12) | (continuation(i + 1)? << 6) | continuation(i + 2)?,
            );
            i += 3;
        } else {
            return Err(ClassFileError::InvalidUtf8);
        }
    }

    Ok(char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect())
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let remaining = self.bytes.len() - self.pos;
        if n > remaining {
            return Err(ClassFileError::Truncated {
                offset: self.pos,
                needed: n - remaining,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    fn u1(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u2(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u4(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u8(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_be_bytes(buf))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{AnnotationSpec, ClassFileBuilder, MethodSpec, ValueSpec};
    use super::*;

    #[test]
    fn parse_class_reads_name_methods_and_annotations() -> Result<()> {
        let bytes = ClassFileBuilder::new("com.acme.Widget")
            .method(
                MethodSpec::new("doThing")
                    .line(42)
                    .visible(AnnotationSpec::new("com.acme.Visible").string("value", "v"))
                    .invisible(AnnotationSpec::new("com.acme.Hidden")),
            )
            .method(MethodSpec::new("plain"))
            .build();

        let class = parse_class(&bytes)?;
        assert_eq!(class.name, "com.acme.Widget");
        assert_eq!(class.methods.len(), 2);

        let do_thing = &class.methods[0];
        assert_eq!(do_thing.name, "doThing");
        assert_eq!(do_thing.line_number, 42);
        let types: Vec<&str> = do_thing
            .annotations
            .iter()
            .map(|a| a.type_name.as_str())
            .collect();
        assert_eq!(types, vec!["com.acme.Visible", "com.acme.Hidden"]);
        assert_eq!(
            do_thing.annotations[0].members,
            vec![("value".to_string(), ElementValue::String("v".to_string()))]
        );

        let plain = &class.methods[1];
        assert_eq!(plain.line_number, 0);
        assert!(plain.annotations.is_empty());
        Ok(())
    }

    #[test]
    fn element_values_render_like_source_literals() -> Result<()> {
        let bytes = ClassFileBuilder::new("a.B")
            .method(
                MethodSpec::new("m").visible(
                    AnnotationSpec::new("a.Ann")
                        .string("s", "text")
                        .member("i", ValueSpec::Int(7))
                        .member("z", ValueSpec::Bool(true))
                        .member("e", ValueSpec::Enum("a.Level".into(), "HIGH".into()))
                        .member(
                            "arr",
                            ValueSpec::Array(vec![ValueSpec::Int(1), ValueSpec::Str("x".into())]),
                        ),
                ),
            )
            .build();

        let class = parse_class(&bytes)?;
        let rendered: Vec<String> = class.methods[0].annotations[0]
            .members
            .iter()
            .map(|(_, v)| v.to_string())
            .collect();
        assert_eq!(rendered, vec!["\"text\"", "7", "true", "a.Level.HIGH", "{1, \"x\"}"]);
        assert_eq!(
            class.methods[0].annotations[0].to_string(),
            "@a.Ann(s=\"text\", i=7, z=true, e=a.Level.HIGH, arr={1, \"x\"})"
        );
        Ok(())
    }

    #[test]
    fn parse_class_rejects_bad_magic() {
        let err = parse_class(&[0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 0, 52]).unwrap_err();
        assert!(matches!(err, ClassFileError::BadMagic(0xDEAD_BEEF)));
    }

    #[test]
    fn parse_class_rejects_truncated_input() {
        let bytes = ClassFileBuilder::new("a.B")
            .method(MethodSpec::new("m").line(3))
            .build();
        let err = parse_class(&bytes[..bytes.len() - 5]).unwrap_err();
        assert!(matches!(err, ClassFileError::Truncated { .. }));
    }

    #[test]
    fn parse_class_rejects_unknown_constant_tag() {
        let mut bytes = ClassFileBuilder::new("a.B").build();
        bytes[10] = 99;
        let err = parse_class(&bytes).unwrap_err();
        assert!(matches!(
            err,
            ClassFileError::UnknownConstantTag { tag: 99, offset: 10 }
        ));
    }

    #[test]
    fn modified_utf8_handles_nul_and_surrogate_pairs() -> Result<()> {
        assert_eq!(decode_modified_utf8(&[b'a', 0xC0, 0x80, b'b'])?, "a\0b");
        // U+1F600 as an encoded surrogate pair
        let smiley = [0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80];
        assert_eq!(decode_modified_utf8(&smiley)?, "\u{1F600}");
        assert!(decode_modified_utf8(&[0xC3]).is_err());
        Ok(())
    }

    #[test]
    fn descriptor_to_type_name_handles_objects_primitives_and_arrays() -> Result<()> {
        assert_eq!(descriptor_to_type_name("Lcom/foo/Bar;")?, "com.foo.Bar");
        assert_eq!(descriptor_to_type_name("I")?, "int");
        assert_eq!(descriptor_to_type_name("[[Ljava/lang/String;")?, "java.lang.String[][]");
        assert!(descriptor_to_type_name("Lbroken").is_err());
        assert!(descriptor_to_type_name("[V").is_err());
        Ok(())
    }
}
