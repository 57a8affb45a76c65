// Résumé CRUD, validation and assistant merges, plus the HTTP entry points that hand a
// stored or draft document to the export core.

pub mod handlers;
pub mod merge;
pub mod store;
pub mod validation;

pub use store::{MemoryResumeStore, PgResumeStore, ResumeStore};
