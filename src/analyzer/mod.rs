//! Analysis pipeline entry point
//!
//! [`Analyzer::analyze`] is the whole public surface: one URL in, one
//! [`AnalysisResult`] out. Collaborators (HTTP transport, cache store, TLS
//! probe, fallback texts) are injected through [`AnalyzerBuilder`].

mod fallback;
mod options;
mod orchestrator;
mod result;
mod single_flight;

pub use fallback::{ConfigFallback, FallbackProvider};
pub use options::AnalysisOptions;
pub use orchestrator::{Analyzer, AnalyzerBuilder};
pub use result::{AnalysisResult, ErrorEntry, ErrorKind, ResultSource};
pub use single_flight::{FlightGuard, SingleFlight};
