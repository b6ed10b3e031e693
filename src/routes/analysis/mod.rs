mod handler;
mod model;

pub use handler::{advise, analyze};
pub use model::{AnalyzeQuery, AnalyzeResponse};
