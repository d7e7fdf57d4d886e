//! Aggregated scan results: package → class → method records.
//!
//! Every level owns its children outright, so merging two result sets moves
//! records across by key lookup and never shares state between them. Maps are
//! `BTreeMap`s, which makes every read view come out sorted by package name
//! and then class name without extra work.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Result, ScanError};
use crate::extract::{AnnotationKind, AnnotationRecord};

/// Split a fully-qualified class name on its last dot.
///
/// A name without a dot belongs to the unnamed package, `""`.
pub fn split_class_name(fq_class_name: &str) -> (&str, &str) {
    fq_class_name.rsplit_once('.').unwrap_or(("", fq_class_name))
}

/// Records found in one class, kept sorted by method name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassAnnotations {
    package_name: String,
    class_name: String,
    annotations: Vec<AnnotationRecord>,
}

impl ClassAnnotations {
    pub fn new(package_name: impl Into<String>, class_name: impl Into<String>) -> Result<Self> {
        let class_name = class_name.into();
        if class_name.is_empty() {
            return Err(ScanError::InvalidArgument(
                "class annotations need a class name".to_string(),
            ));
        }
        Ok(Self {
            package_name: package_name.into(),
            class_name,
            annotations: Vec::new(),
        })
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn annotations(&self) -> &[AnnotationRecord] {
        &self.annotations
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn add(&mut self, record: AnnotationRecord) {
        let at = self.annotations.partition_point(|r| r <= &record);
        self.annotations.insert(at, record);
    }

    /// Append `other`'s records. Both sides must describe the same class.
    pub fn merge(&mut self, other: ClassAnnotations) {
        self.annotations.extend(other.annotations);
        self.annotations.sort();
    }
}

impl PartialOrd for ClassAnnotations {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClassAnnotations {
    fn cmp(&self, other: &Self) -> Ordering {
        self.class_name
            .cmp(&other.class_name)
            .then_with(|| self.package_name.cmp(&other.package_name))
            .then_with(|| self.annotations.cmp(&other.annotations))
    }
}

/// All classes of one package, split by annotation kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageResults {
    package_name: String,
    defects: BTreeMap<String, ClassAnnotations>,
    accepted_defects: BTreeMap<String, ClassAnnotations>,
}

impl PackageResults {
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            defects: BTreeMap::new(),
            accepted_defects: BTreeMap::new(),
        }
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    fn bucket(&self, kind: AnnotationKind) -> &BTreeMap<String, ClassAnnotations> {
        match kind {
            AnnotationKind::Defect => &self.defects,
            AnnotationKind::AcceptedDefect => &self.accepted_defects,
        }
    }

    fn bucket_mut(&mut self, kind: AnnotationKind) -> &mut BTreeMap<String, ClassAnnotations> {
        match kind {
            AnnotationKind::Defect => &mut self.defects,
            AnnotationKind::AcceptedDefect => &mut self.accepted_defects,
        }
    }

    pub fn add(&mut self, class_name: &str, record: AnnotationRecord) -> Result<()> {
        let package_name = self.package_name.clone();
        let classes = match self.bucket_mut(record.kind()).entry(class_name.to_string()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(ClassAnnotations::new(package_name, class_name)?),
        };
        classes.add(record);
        Ok(())
    }

    /// Fold `other` into this package. Both sides must describe the same package.
    pub fn merge(&mut self, mut other: PackageResults) {
        for kind in AnnotationKind::ALL {
            let incoming = std::mem::take(other.bucket_mut(kind));
            let bucket = self.bucket_mut(kind);
            for (class_name, classes) in incoming {
                match bucket.entry(class_name) {
                    Entry::Occupied(e) => e.into_mut().merge(classes),
                    Entry::Vacant(e) => {
                        e.insert(classes);
                    }
                }
            }
        }
    }

    /// Classes with records of `kind`, by class name.
    pub fn classes_of_kind(&self, kind: AnnotationKind) -> Vec<&ClassAnnotations> {
        self.bucket(kind).values().collect()
    }

    pub fn class_results(&self, class_name: &str, kind: AnnotationKind) -> Option<&ClassAnnotations> {
        self.bucket(kind).get(class_name)
    }

    pub fn has_class_results(&self, class_name: &str, kind: AnnotationKind) -> bool {
        self.class_results(class_name, kind)
            .is_some_and(|c| !c.is_empty())
    }

    pub fn has_results_of_kind(&self, kind: AnnotationKind) -> bool {
        self.bucket(kind).values().any(|c| !c.is_empty())
    }

    pub fn count_of_kind(&self, kind: AnnotationKind) -> usize {
        self.bucket(kind).values().map(ClassAnnotations::len).sum()
    }

    /// Every class touched by either kind, sorted and deduplicated.
    pub fn class_names(&self) -> Vec<&str> {
        self.defects
            .keys()
            .chain(self.accepted_defects.keys())
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Root of a scan's findings, keyed by package name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanResults {
    packages: BTreeMap<String, PackageResults>,
}

impl ScanResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// File `record` under the package and class derived from `fq_class_name`.
    pub fn add_result(&mut self, fq_class_name: &str, record: AnnotationRecord) -> Result<()> {
        let (package_name, class_name) = split_class_name(fq_class_name);
        self.packages
            .entry(package_name.to_string())
            .or_insert_with(|| PackageResults::new(package_name))
            .add(class_name, record)
    }

    /// File `record` under its own class name.
    pub fn add_record(&mut self, record: AnnotationRecord) -> Result<()> {
        let fq_class_name = record.class_name().to_string();
        self.add_result(&fq_class_name, record)
    }

    pub fn merge(&mut self, other: ScanResults) {
        for (package_name, package) in other.packages {
            match self.packages.entry(package_name) {
                Entry::Occupied(e) => e.into_mut().merge(package),
                Entry::Vacant(e) => {
                    e.insert(package);
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// All packages by name.
    pub fn packages(&self) -> impl Iterator<Item = &PackageResults> {
        self.packages.values()
    }

    pub fn package(&self, package_name: &str) -> Option<&PackageResults> {
        self.packages.get(package_name)
    }

    pub fn has_results_of_kind(&self, kind: AnnotationKind) -> bool {
        self.packages.values().any(|p| p.has_results_of_kind(kind))
    }

    pub fn has_results(&self) -> bool {
        AnnotationKind::ALL
            .into_iter()
            .any(|kind| self.has_results_of_kind(kind))
    }

    pub fn count_of_kind(&self, kind: AnnotationKind) -> usize {
        self.packages.values().map(|p| p.count_of_kind(kind)).sum()
    }

    /// Packages holding records of `kind`, each with its classes of that kind.
    pub fn packages_with_kind(&self, kind: AnnotationKind) -> Vec<(&str, Vec<&ClassAnnotations>)> {
        self.packages
            .values()
            .filter(|p| p.has_results_of_kind(kind))
            .map(|p| (p.package_name(), p.classes_of_kind(kind)))
            .collect()
    }

    pub fn class_names_in(&self, package_name: &str) -> Vec<&str> {
        self.package(package_name)
            .map(PackageResults::class_names)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;

    fn defect(class: &str, method: &str) -> AnnotationRecord {
        AnnotationRecord::new(AnnotationKind::Defect, class, method, 0).with_member("value", "note")
    }

    fn accepted(class: &str, method: &str) -> AnnotationRecord {
        AnnotationRecord::new(AnnotationKind::AcceptedDefect, class, method, 0)
            .with_member("author", "cjohnston")
    }

    fn results(records: Vec<AnnotationRecord>) -> ScanResults {
        let mut r = ScanResults::new();
        for record in records {
            r.add_record(record).unwrap();
        }
        r
    }

    /// Per-class record multisets, ignoring positions.
    fn contents(results: &ScanResults) -> Map<(String, String, AnnotationKind), Vec<AnnotationRecord>> {
        let mut out = Map::new();
        for p in results.packages() {
            for kind in AnnotationKind::ALL {
                for c in p.classes_of_kind(kind) {
                    let mut records = c.annotations().to_vec();
                    records.sort();
                    out.insert(
                        (p.package_name().to_string(), c.class_name().to_string(), kind),
                        records,
                    );
                }
            }
        }
        out
    }

    #[test]
    fn class_annotations_require_class_name() {
        assert!(matches!(
            ClassAnnotations::new("pkg", ""),
            Err(ScanError::InvalidArgument(_))
        ));
        assert!(ClassAnnotations::new("", "Default").is_ok());
    }

    #[test]
    fn class_annotations_stay_sorted_by_method() -> Result<()> {
        let mut c = ClassAnnotations::new("a", "B")?;
        c.add(defect("a.B", "bMethod"));
        c.add(defect("a.B", "aMethod"));
        let names: Vec<&str> = c.annotations().iter().map(|r| r.method_name()).collect();
        assert_eq!(names, vec!["aMethod", "bMethod"]);
        Ok(())
    }

    #[test]
    fn class_annotations_merge_interleaves_kinds() -> Result<()> {
        let mut left = ClassAnnotations::new("package", "Class")?;
        left.add(defect("package.Class", "method2"));
        left.add(defect("package.Class", "method8"));

        let mut right = ClassAnnotations::new("package", "Class")?;
        right.add(accepted("package.Class", "method1"));
        right.add(accepted("package.Class", "method7"));

        left.merge(right);
        let names: Vec<&str> = left.annotations().iter().map(|r| r.method_name()).collect();
        assert_eq!(names, vec!["method1", "method2", "method7", "method8"]);
        Ok(())
    }

    #[test]
    fn class_annotations_sort_by_class_name() -> Result<()> {
        let mut list = vec![
            ClassAnnotations::new("package", "ClassName2")?,
            ClassAnnotations::new("package", "ClassName1")?,
        ];
        list.sort();
        assert_eq!(list[0].class_name(), "ClassName1");
        assert_eq!(list[1].class_name(), "ClassName2");
        Ok(())
    }

    #[test]
    fn split_class_name_uses_last_dot() {
        assert_eq!(split_class_name("com.foo.Bar"), ("com.foo", "Bar"));
        assert_eq!(split_class_name("com.foo.Bar$Inner"), ("com.foo", "Bar$Inner"));
        assert_eq!(split_class_name("Bare"), ("", "Bare"));
    }

    #[test]
    fn add_result_derives_package_and_class() {
        let r = results(vec![defect("com.foo.Bar", "m")]);
        let package = r.package("com.foo").unwrap();
        let class = package.class_results("Bar", AnnotationKind::Defect).unwrap();
        assert_eq!(class.package_name(), "com.foo");
        assert_eq!(class.class_name(), "Bar");
        assert_eq!(class.len(), 1);
        assert!(package.class_results("Bar", AnnotationKind::AcceptedDefect).is_none());
    }

    #[test]
    fn undotted_class_lands_in_unnamed_package() {
        let r = results(vec![defect("Bare", "m")]);
        assert_eq!(r.class_names_in(""), vec!["Bare"]);
    }

    #[test]
    fn kinds_are_bucketed_independently() {
        let r = results(vec![
            defect("a.B", "m1"),
            accepted("a.B", "m2"),
            accepted("a.C", "m3"),
        ]);
        let package = r.package("a").unwrap();
        assert_eq!(package.class_names(), vec!["B", "C"]);
        assert!(package.has_class_results("B", AnnotationKind::Defect));
        assert!(package.has_class_results("B", AnnotationKind::AcceptedDefect));
        assert!(!package.has_class_results("C", AnnotationKind::Defect));
        assert_eq!(r.count_of_kind(AnnotationKind::Defect), 1);
        assert_eq!(r.count_of_kind(AnnotationKind::AcceptedDefect), 2);
    }

    #[test]
    fn merge_is_order_independent() {
        let a = results(vec![defect("a.B", "x"), accepted("a.B", "y"), defect("c.D", "z")]);
        let b = results(vec![defect("a.B", "w"), defect("e.F", "v"), accepted("a.G", "u")]);

        let mut ab = ScanResults::new();
        ab.merge(a.clone());
        ab.merge(b.clone());

        let mut ba = ScanResults::new();
        ba.merge(b);
        ba.merge(a);

        assert_eq!(contents(&ab), contents(&ba));
        assert_eq!(ab.count_of_kind(AnnotationKind::Defect), 4);
    }

    #[test]
    fn merge_keeps_duplicates() {
        let a = results(vec![defect("a.B", "x"), defect("a.B", "y")]);
        let mut acc = ScanResults::new();
        acc.merge(a.clone());
        acc.merge(a);

        let class = acc
            .package("a")
            .and_then(|p| p.class_results("B", AnnotationKind::Defect))
            .unwrap();
        let names: Vec<&str> = class.annotations().iter().map(|r| r.method_name()).collect();
        assert_eq!(names, vec!["x", "x", "y", "y"]);
    }

    #[test]
    fn read_views_are_sorted() {
        let r = results(vec![
            defect("z.pkg.Zed", "m"),
            defect("a.pkg.Beta", "m"),
            defect("a.pkg.Alpha", "m"),
            accepted("m.pkg.Mid", "m"),
        ]);

        let packages: Vec<&str> = r.packages().map(|p| p.package_name()).collect();
        assert_eq!(packages, vec!["a.pkg", "m.pkg", "z.pkg"]);

        let defects = r.packages_with_kind(AnnotationKind::Defect);
        let shape: Vec<(&str, Vec<&str>)> = defects
            .iter()
            .map(|(p, classes)| (*p, classes.iter().map(|c| c.class_name()).collect()))
            .collect();
        assert_eq!(
            shape,
            vec![("a.pkg", vec!["Alpha", "Beta"]), ("z.pkg", vec!["Zed"])]
        );
    }

    #[test]
    fn empty_results_report_nothing() {
        let r = ScanResults::new();
        assert!(r.is_empty());
        assert!(!r.has_results());
        for kind in AnnotationKind::ALL {
            assert!(!r.has_results_of_kind(kind));
            assert_eq!(r.count_of_kind(kind), 0);
            assert!(r.packages_with_kind(kind).is_empty());
        }
        assert!(r.class_names_in("missing").is_empty());
    }
}
