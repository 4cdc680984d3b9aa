//! ファイル自動発見機能
//!
//! 規約ベースのディレクトリ構造からスタック定義ファイルを発見します。

use crate::error::{FlowError, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// プロジェクトルートを指定する環境変数
pub const PROJECT_ROOT_ENV: &str = "STACKFLOW_PROJECT_ROOT";

/// 発見されたファイル群
#[derive(Debug, Clone, Default)]
pub struct DiscoveredFiles {
    /// ルートファイル (stack.kdl)
    pub root: Option<PathBuf>,
    /// 分割されたリソース定義 (resources/**/*.kdl)
    pub resources: Vec<PathBuf>,
    /// ローカルオーバーライドファイル (stack.local.kdl)
    pub local_override: Option<PathBuf>,
    /// パラメータ値ファイル (.env)
    pub env_file: Option<PathBuf>,
}

impl DiscoveredFiles {
    /// 読み込み順に並べたスタック定義ファイル
    pub fn stack_files(&self) -> Vec<&Path> {
        let mut files: Vec<&Path> = Vec::with_capacity(self.resources.len() + 2);
        if let Some(root) = &self.root {
            files.push(root);
        }
        files.extend(self.resources.iter().map(PathBuf::as_path));
        if let Some(local) = &self.local_override {
            files.push(local);
        }
        files
    }
}

/// プロジェクトルートを検出
///
/// 以下の優先順位で検索:
/// 1. 環境変数 STACKFLOW_PROJECT_ROOT
/// 2. カレントディレクトリから上に向かって以下を探す:
///    - stack.kdl
///    - .stackflow/stack.kdl
#[tracing::instrument]
pub fn find_project_root() -> Result<PathBuf> {
    if let Ok(root) = std::env::var(PROJECT_ROOT_ENV) {
        let path = PathBuf::from(&root);
        debug!(env_root = %root, "Checking STACKFLOW_PROJECT_ROOT");
        if has_root_file(&path) {
            info!(project_root = %path.display(), "Found project root from environment variable");
            return Ok(path);
        }
    }

    let start_dir = std::env::current_dir()?;
    find_project_root_from(&start_dir)
}

/// 指定ディレクトリから上に向かってプロジェクトルートを探す
pub fn find_project_root_from(start_dir: &Path) -> Result<PathBuf> {
    let mut current = start_dir.to_path_buf();
    debug!(start_dir = %start_dir.display(), "Searching for project root");

    loop {
        if has_root_file(&current) {
            info!(project_root = %current.display(), "Found project root");
            return Ok(current);
        }

        // 親ディレクトリへ
        if !current.pop() {
            break;
        }
    }

    warn!(start_dir = %start_dir.display(), "Project root not found");
    Err(FlowError::ProjectRootNotFound(start_dir.to_path_buf()))
}

fn has_root_file(dir: &Path) -> bool {
    dir.join("stack.kdl").exists() || dir.join(".stackflow/stack.kdl").exists()
}

/// プロジェクトルートからファイルを自動発見
#[tracing::instrument(skip(project_root), fields(project_root = %project_root.display()))]
pub fn discover_files(project_root: &Path) -> Result<DiscoveredFiles> {
    debug!("Starting file discovery");
    let mut discovered = DiscoveredFiles {
        root: first_existing(project_root, "stack.kdl"),
        ..Default::default()
    };

    // resources/**/*.kdl
    let resources_dir = project_root.join("resources");
    if resources_dir.is_dir() {
        discovered.resources = discover_kdl_files(&resources_dir)?;
        info!(
            resource_file_count = discovered.resources.len(),
            "Discovered resource files"
        );
    }

    discovered.local_override = first_existing(project_root, "stack.local.kdl");
    discovered.env_file = first_existing(project_root, ".env");

    Ok(discovered)
}

/// `<root>/<name>` または `<root>/.stackflow/<name>` を探す（前者優先）
fn first_existing(project_root: &Path, name: &str) -> Option<PathBuf> {
    let direct = project_root.join(name);
    let hidden = project_root.join(".stackflow").join(name);
    if direct.exists() {
        debug!(file = %direct.display(), "Found file");
        Some(direct)
    } else if hidden.exists() {
        debug!(file = %hidden.display(), "Found file in .stackflow/");
        Some(hidden)
    } else {
        None
    }
}

/// ディレクトリ配下の .kdl ファイルを再帰的に発見
///
/// アルファベット順にソートして返す
fn discover_kdl_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut visited = HashSet::new();

    visit_dir(dir, &mut files, &mut visited)?;

    files.sort();

    Ok(files)
}

/// ディレクトリを再帰的に走査
fn visit_dir(dir: &Path, files: &mut Vec<PathBuf>, visited: &mut HashSet<PathBuf>) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    // 正規化されたパスを取得してループを検出
    let canonical_dir = dir.canonicalize().map_err(|e| FlowError::DiscoveryError {
        path: dir.to_path_buf(),
        message: format!("パスの正規化に失敗: {}", e),
    })?;

    if !visited.insert(canonical_dir.clone()) {
        warn!(dir = %canonical_dir.display(), "Symlink loop detected, skipping");
        return Ok(());
    }

    let entries = std::fs::read_dir(dir).map_err(|e| FlowError::DiscoveryError {
        path: dir.to_path_buf(),
        message: format!("ディレクトリの読み込みに失敗: {}", e),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| FlowError::DiscoveryError {
            path: dir.to_path_buf(),
            message: format!("ディレクトリエントリの読み込みに失敗: {}", e),
        })?;
        let path = entry.path();

        if path.is_dir() {
            visit_dir(&path, files, visited)?;
        } else if path.extension().and_then(|s| s.to_str()) == Some("kdl") {
            files.push(path);
        }
    }

    Ok(())
}
