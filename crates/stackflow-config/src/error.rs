use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "スタックファイルが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: stack.local.kdl, stack.kdl\n\
        - ./.stackflow/ ディレクトリ\n\
        または STACKFLOW_FILE 環境変数で直接指定できます"
    )]
    StackFileNotFound,

    #[error("設定ファイルの形式が不正です: {path}\n理由: {source}")]
    InvalidSettings {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
