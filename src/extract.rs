//! Turning decoded annotations into defect records.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::classfile::{Annotation, ClassFile, MethodInfo};

pub const KNOWN_DEFECT_ANNOTATION: &str = "com.megatome.knowndefects.KnownDefect";
pub const KNOWN_ACCEPTED_DEFECT_ANNOTATION: &str =
    "com.megatome.knowndefects.KnownAndAcceptedDefect";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Defect,
    AcceptedDefect,
}

const KINDS: [(&str, AnnotationKind); 2] = [
    (KNOWN_DEFECT_ANNOTATION, AnnotationKind::Defect),
    (KNOWN_ACCEPTED_DEFECT_ANNOTATION, AnnotationKind::AcceptedDefect),
];

impl AnnotationKind {
    pub const ALL: [AnnotationKind; 2] = [AnnotationKind::Defect, AnnotationKind::AcceptedDefect];

    pub fn from_type_name(type_name: &str) -> Option<Self> {
        KINDS
            .iter()
            .find(|(name, _)| *name == type_name)
            .map(|(_, kind)| *kind)
    }

    pub fn type_name(self) -> &'static str {
        match self {
            AnnotationKind::Defect => KNOWN_DEFECT_ANNOTATION,
            AnnotationKind::AcceptedDefect => KNOWN_ACCEPTED_DEFECT_ANNOTATION,
        }
    }

    /// The member names the annotation declares.
    pub fn member_names(self) -> &'static [&'static str] {
        match self {
            AnnotationKind::Defect => &["value"],
            AnnotationKind::AcceptedDefect => &["author", "date", "reason"],
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            AnnotationKind::Defect => "@KnownDefect",
            AnnotationKind::AcceptedDefect => "@KnownAndAcceptedDefect",
        }
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotationRecord {
    kind: AnnotationKind,
    class_name: String,
    method_name: String,
    line_number: u32,
    members: BTreeMap<String, String>,
}

impl AnnotationRecord {
    pub fn new(
        kind: AnnotationKind,
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        line_number: u32,
    ) -> Self {
        Self {
            kind,
            class_name: class_name.into(),
            method_name: method_name.into(),
            line_number,
            members: BTreeMap::new(),
        }
    }

    pub fn with_member(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.members.insert(name.into(), value.into());
        self
    }

    pub fn kind(&self) -> AnnotationKind {
        self.kind
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn line_number(&self) -> u32 {
        self.line_number
    }

    pub fn members(&self) -> &BTreeMap<String, String> {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&str> {
        self.members.get(name).map(String::as_str)
    }

    pub fn value(&self) -> Option<&str> {
        self.member("value")
    }

    pub fn author(&self) -> Option<&str> {
        self.member("author")
    }

    pub fn date(&self) -> Option<&str> {
        self.member("date")
    }

    pub fn reason(&self) -> Option<&str> {
        self.member("reason")
    }
}

impl PartialOrd for AnnotationRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Method name first; the remaining fields only make the order total.
impl Ord for AnnotationRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.method_name
            .cmp(&other.method_name)
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| self.line_number.cmp(&other.line_number))
            .then_with(|| self.class_name.cmp(&other.class_name))
            .then_with(|| self.members.cmp(&other.members))
    }
}

/// Strip one pair of double quotes wrapping the whole value.
pub fn strip_quotes(raw: &str) -> &str {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        &raw[1..raw.len() - 1]
    } else {
        raw
    }
}

/// Build a record from one annotation occurrence, or `None` when the
/// annotation is not one of the two defect markers.
pub fn extract(
    annotation: &Annotation,
    class_name: &str,
    method_name: &str,
    line_number: u32,
) -> Option<AnnotationRecord> {
    let kind = AnnotationKind::from_type_name(&annotation.type_name)?;
    let mut record = AnnotationRecord::new(kind, class_name, method_name, line_number);
    for (name, value) in &annotation.members {
        let raw = value.to_string();
        record
            .members
            .insert(name.clone(), strip_quotes(&raw).to_string());
    }
    Some(record)
}

pub fn extract_method(class_name: &str, method: &MethodInfo) -> Vec<AnnotationRecord> {
    method
        .annotations
        .iter()
        .filter_map(|a| extract(a, class_name, &method.name, method.line_number))
        .collect()
}

pub fn extract_class(class: &ClassFile) -> Vec<AnnotationRecord> {
    class
        .methods
        .iter()
        .flat_map(|m| extract_method(&class.name, m))
        .collect()
}
