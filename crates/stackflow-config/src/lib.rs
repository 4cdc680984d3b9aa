pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use stackflow_plan::Policy;
use std::path::{Path, PathBuf};

/// スタックファイルを直接指定する環境変数
pub const STACK_FILE_ENV: &str = "STACKFLOW_FILE";

const SETTINGS_FILE: &str = "config.yaml";

/// 検証結果のどの重大度で失敗させるか（合成ポリシーと共通）
pub use stackflow_plan::BlockOn;

/// プランの出力形式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

/// ユーザー設定
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Settings {
    pub block_on: BlockOn,
    pub format: OutputFormat,
}

impl Settings {
    /// 合成に渡すポリシー
    pub fn policy(&self) -> Policy {
        Policy::new(self.block_on)
    }
}

/// config.yaml の内容（未指定のキーは下位の設定を引き継ぐ）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    block_on: Option<BlockOn>,
    format: Option<OutputFormat>,
}

impl Settings {
    fn merge(mut self, file: SettingsFile) -> Self {
        if let Some(block_on) = file.block_on {
            self.block_on = block_on;
        }
        if let Some(format) = file.format {
            self.format = format;
        }
        self
    }
}

/// ユーザー設定ファイルのパス (~/.config/stackflow/config.yaml)
pub fn user_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("stackflow").join(SETTINGS_FILE))
}

/// 設定を読み込む
///
/// ユーザー設定の上にプロジェクト設定 (`<project>/.stackflow/config.yaml`) を重ねる。
/// どちらも無ければデフォルト値。
pub fn load_settings(project_root: Option<&Path>) -> Result<Settings> {
    let project = project_root.map(|root| root.join(".stackflow").join(SETTINGS_FILE));
    load_settings_from(user_settings_path().as_deref(), project.as_deref())
}

/// 指定したファイルから設定を読み込む（後に指定したものが優先）
pub fn load_settings_from(user: Option<&Path>, project: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    for path in [user, project].into_iter().flatten() {
        if path.exists() {
            settings = settings.merge(read_settings_file(path)?);
        }
    }
    Ok(settings)
}

fn read_settings_file(path: &Path) -> Result<SettingsFile> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(SettingsFile::default());
    }
    serde_yaml::from_str(&content).map_err(|source| ConfigError::InvalidSettings {
        path: path.to_path_buf(),
        source,
    })
}

/// 単一ファイルモードで使うスタックファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 STACKFLOW_FILE (直接パス指定)
/// 2. カレントディレクトリ: stack.local.kdl, stack.kdl
/// 3. ./.stackflow/ ディレクトリ内: 同様の順序
pub fn find_stack_file() -> Result<PathBuf> {
    // 1. 環境変数で直接指定
    if let Ok(stack_path) = std::env::var(STACK_FILE_ENV) {
        let path = PathBuf::from(stack_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;
    find_stack_file_in(&current_dir)
}

/// 指定ディレクトリでスタックファイルを探す
pub fn find_stack_file_in(dir: &Path) -> Result<PathBuf> {
    let candidates = ["stack.local.kdl", "stack.kdl"];

    for base in [dir.to_path_buf(), dir.join(".stackflow")] {
        for filename in &candidates {
            let path = base.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    Err(ConfigError::StackFileNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_user_settings_path() {
        if let Some(path) = user_settings_path() {
            assert!(path.ends_with("stackflow/config.yaml"));
        }
    }

    #[test]
    fn test_settings_default_without_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let settings =
            load_settings_from(Some(&temp_dir.path().join("missing.yaml")), None).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.block_on, BlockOn::Errors);
        assert_eq!(settings.format, OutputFormat::Json);
    }

    #[test]
    fn test_project_settings_override_user() {
        let temp_dir = tempfile::tempdir().unwrap();
        let user = temp_dir.path().join("user.yaml");
        let project = temp_dir.path().join("project.yaml");
        fs::write(&user, "block_on: warnings\nformat: yaml\n").unwrap();
        fs::write(&project, "block_on: never\n").unwrap();

        let settings = load_settings_from(Some(&user), Some(&project)).unwrap();

        // block_on はプロジェクト設定、format はユーザー設定を引き継ぐ
        assert_eq!(settings.block_on, BlockOn::Never);
        assert_eq!(settings.format, OutputFormat::Yaml);
    }

    #[test]
    fn test_load_settings_from_project_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp_dir.path().join(".stackflow")).unwrap();
        fs::write(
            temp_dir.path().join(".stackflow/config.yaml"),
            "format: yaml\n",
        )
        .unwrap();

        let project = temp_dir.path().join(".stackflow/config.yaml");
        let settings = load_settings_from(None, Some(&project)).unwrap();
        assert_eq!(settings.format, OutputFormat::Yaml);
    }

    #[test]
    fn test_settings_policy() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.yaml");

        assert_eq!(Settings::default().policy(), Policy::default());

        fs::write(&path, "block_on: never\n").unwrap();
        let settings = load_settings_from(Some(&path), None).unwrap();
        assert_eq!(settings.policy(), Policy::report_only());

        fs::write(&path, "block_on: warnings\n").unwrap();
        let settings = load_settings_from(Some(&path), None).unwrap();
        assert_eq!(settings.policy(), Policy::new(BlockOn::Warnings));
    }

    #[test]
    fn test_empty_settings_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "\n").unwrap();

        let settings = load_settings_from(Some(&path), None).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_invalid_settings_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "block_on: sometimes\n").unwrap();

        match load_settings_from(Some(&path), None) {
            Err(ConfigError::InvalidSettings { path: p, .. }) => assert_eq!(p, path),
            other => panic!("Expected InvalidSettings error, got {:?}", other),
        }

        // 不明なキーもエラー
        fs::write(&path, "fail_on: errors\n").unwrap();
        assert!(load_settings_from(Some(&path), None).is_err());
    }

    #[test]
    fn test_find_stack_file_in_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("stack.kdl"), "// test").unwrap();

        let stack_file = find_stack_file_in(temp_dir.path()).unwrap();
        assert!(stack_file.ends_with("stack.kdl"));
    }

    #[test]
    fn test_find_stack_file_local_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("stack.kdl"), "// shared").unwrap();
        fs::write(temp_dir.path().join("stack.local.kdl"), "// local").unwrap();

        // stack.local.kdl が優先される
        let result = find_stack_file_in(temp_dir.path()).unwrap();
        assert!(result.ends_with("stack.local.kdl"));
    }

    #[test]
    fn test_find_stack_file_in_stackflow_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let stack_dir = temp_dir.path().join(".stackflow");
        fs::create_dir(&stack_dir).unwrap();
        fs::write(stack_dir.join("stack.kdl"), "// in stackflow dir").unwrap();

        let result = find_stack_file_in(temp_dir.path()).unwrap();
        assert!(result.ends_with(".stackflow/stack.kdl"));
    }

    #[test]
    fn test_find_stack_file_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();

        let result = find_stack_file_in(temp_dir.path());
        assert!(matches!(result, Err(ConfigError::StackFileNotFound)));
    }

    #[test]
    #[serial]
    fn test_find_stack_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("stack.kdl"), "// test").unwrap();

        // テンポラリディレクトリに移動
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_stack_file();

        // 元のディレクトリに戻る
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with("stack.kdl"));
    }

    #[test]
    #[serial]
    fn test_find_stack_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let stack_path = temp_dir.path().join("custom.kdl");
        fs::write(&stack_path, "// custom").unwrap();

        // 環境変数を設定
        unsafe {
            std::env::set_var(STACK_FILE_ENV, stack_path.to_str().unwrap());
        }

        let result = find_stack_file();

        // クリーンアップ
        unsafe {
            std::env::remove_var(STACK_FILE_ENV);
        }

        assert_eq!(result.unwrap(), stack_path);
    }
}
