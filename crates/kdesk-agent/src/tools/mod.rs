//! Tools offered to the model.

mod information;
mod web;

pub use information::{INFORMATION_TOOL_NAME, InformationParams, InformationTool};
pub use web::{WEB_SEARCH_TOOL_NAME, WebSearchConfig, WebSearchResult, WebSearchTool};
