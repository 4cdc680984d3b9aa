use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("KDLパースエラー: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("ファイル読み込みエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO エラー: {path}\n理由: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("無効な設定: {0}")]
    InvalidConfig(String),

    #[error("テンプレートエラー: {file}\n理由: {message}")]
    TemplateError { file: PathBuf, message: String },

    #[error("テンプレート展開エラー: {0}")]
    TemplateRenderError(String),

    #[error("ファイル発見エラー: {path}\n理由: {message}")]
    DiscoveryError { path: PathBuf, message: String },

    #[error(
        "プロジェクトルートが見つかりません\n探索開始位置: {0}\nヒント: stack.kdl ファイルを含むディレクトリで実行してください"
    )]
    ProjectRootNotFound(PathBuf),

    #[error("リソース名が重複しています: {0}")]
    DuplicateName(String),

    #[error("不明なリソース種別です: {0}")]
    UnknownResourceKind(String),

    #[error("無効な参照です: {0}")]
    InvalidReference(String),

    #[error("パラメータ '{0}' の値が指定されていません\nヒント: --param {0}=<value> または STACK_{1} 環境変数で指定してください")]
    MissingParameter(String, String),
}

impl FlowError {
    pub(crate) fn missing_parameter(name: &str) -> Self {
        FlowError::MissingParameter(name.to_string(), name.to_uppercase())
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
