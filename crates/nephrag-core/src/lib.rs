//! Category routing, lab-value scoring, configuration and the question-answering service.

pub mod catalog;
pub mod category;
pub mod config;
pub mod error;
pub mod lab;
pub mod render;
pub mod service;

pub use catalog::IndexCatalog;
pub use category::{Category, KeywordTable, route};
pub use error::{NephragError, Result};
pub use lab::{Finding, LabError, LabField, LabPanel, ScoreReport, Severity, evaluate, evaluate_raw};
pub use service::{Answer, AskSettings, QaService};
