//! # known-defects
//!
//! Finds methods marked `@KnownDefect` or `@KnownAndAcceptedDefect` in
//! compiled Java classes and aggregates them by package, class and method.
//!
//! ## Architecture
//!
//! - **filter**: Which discovered files are class files worth decoding
//! - **walk**: Lazy class-file discovery under a directory or jar root
//! - **classfile**: Class-file decoding down to method annotations
//! - **extract**: Defect records from the two recognized annotations
//! - **results**: Package → class → record aggregation and merging
//! - **scanner**: Multi-root scan orchestration
//! - **log**: Injected diagnostic sink and tracing setup
//! - **config** / **cli**: Command-line surface for the binary

pub mod classfile;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod filter;
pub mod log;
pub mod results;
pub mod scanner;
pub mod walk;

pub use error::{Result, ScanError};
pub use extract::{AnnotationKind, AnnotationRecord};
pub use results::{ClassAnnotations, PackageResults, ScanResults};
pub use scanner::Scanner;
