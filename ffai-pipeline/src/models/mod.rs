//! Data models for the form-to-AI pipeline

pub mod pdf_artifact;
pub mod processing;
pub mod prompt;
pub mod submission;

pub use pdf_artifact::PdfArtifact;
pub use processing::{LoggedResult, ProcessingResult, ProcessingStatus, TokenUsage};
pub use prompt::{
    BackgroundSettings, EmailSettings, Orientation, PageSize, PdfSettings, PromptDefinition,
    PromptMode, ResponseAction,
};
pub use submission::{FormRef, PromptRef, SubmissionEvent, SubmissionSnapshot};
