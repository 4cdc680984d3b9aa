//! stackflow core
//!
//! インフラ構成（VPC、サブネット、セキュリティグループ、インスタンス、
//! ロードバランサー）を宣言するためのリソースモデルと、
//! KDLスタックファイルを `declare` 呼び出しに変換するローダーを提供します。

pub mod discovery;
pub mod error;
pub mod loader;
pub mod model;
pub mod parser;
pub mod template;

// Re-exports
pub use discovery::{DiscoveredFiles, discover_files, find_project_root, find_project_root_from};
pub use error::{FlowError, Result};
pub use loader::{load_project, load_project_from_root, load_stack_file};
pub use model::*;
pub use parser::{parse_kdl_file, parse_kdl_string};
pub use template::{TemplateProcessor, Variables};
