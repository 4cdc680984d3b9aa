//! テンプレート展開機能
//!
//! Teraを使用してスタックファイルのパラメータ展開を行います。

use crate::error::{FlowError, Result};
use crate::model::Parameter;
use std::collections::BTreeMap;
use std::path::Path;
use tera::{Context, Tera};
use tracing::{debug, info};

/// 環境変数からパラメータを受け付けるプレフィックス
pub const ENV_PREFIX: &str = "STACK_";

/// 変数コンテキスト
pub type Variables = BTreeMap<String, serde_json::Value>;

/// テンプレートプロセッサ
pub struct TemplateProcessor {
    tera: Tera,
    variables: Variables,
}

impl TemplateProcessor {
    /// 新しいテンプレートプロセッサを作成
    pub fn new() -> Self {
        Self {
            tera: Tera::default(),
            variables: Variables::new(),
        }
    }

    /// 変数を追加（同名の変数は上書き）
    pub fn add_variable(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.variables.insert(key.into(), value);
    }

    /// 複数の変数を追加
    pub fn add_variables(&mut self, variables: Variables) {
        self.variables.extend(variables);
    }

    pub fn has_variable(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    /// parameter 宣言のデフォルト値を追加
    ///
    /// デフォルト値は最も優先度が低いため、既存の値は上書きしない。
    pub fn add_parameter_defaults(&mut self, parameters: &[Parameter]) {
        for parameter in parameters {
            if let Some(default) = &parameter.default {
                self.variables
                    .entry(parameter.name.clone())
                    .or_insert_with(|| serde_json::Value::String(default.clone()));
            }
        }
    }

    /// 環境変数を追加（STACK_* のみ）
    ///
    /// `STACK_YOUR_IP` は `your_ip` として登録される。
    #[tracing::instrument(skip(self))]
    pub fn add_env_variables(&mut self) {
        let mut count = 0;

        for (key, value) in std::env::vars() {
            if let Some(name) = key.strip_prefix(ENV_PREFIX)
                && !name.is_empty()
            {
                let name = name.to_lowercase();
                debug!(key = %key, parameter = %name, "Adding environment variable");
                self.variables
                    .insert(name, serde_json::Value::String(value));
                count += 1;
            }
        }

        info!(env_var_count = count, "Added filtered environment variables");
    }

    /// .env ファイルから変数を読み込んで追加
    ///
    /// .env ファイルの変数はプレフィックス制限なしで全て読み込まれます。
    #[tracing::instrument(skip(self))]
    pub fn add_env_file_variables(&mut self, env_file_path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(env_file_path).map_err(|e| FlowError::IoError {
            path: env_file_path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut count = 0;
        for line in content.lines() {
            let line = line.trim();

            // 空行とコメント行をスキップ
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // KEY=VALUE 形式をパース
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = strip_quotes(value.trim());

                debug!(key = %key, "Adding variable from .env file");
                self.variables
                    .insert(key.to_string(), serde_json::Value::String(value.to_string()));
                count += 1;
            }
        }

        info!(
            env_file = %env_file_path.display(),
            variable_count = count,
            "Loaded variables from .env file"
        );

        Ok(())
    }

    /// 宣言された全パラメータに値があることを確認
    pub fn check_parameters(&self, parameters: &[Parameter]) -> Result<()> {
        for parameter in parameters {
            if !self.has_variable(&parameter.name) {
                return Err(FlowError::missing_parameter(&parameter.name));
            }
        }
        Ok(())
    }

    /// 文字列をテンプレートとして展開
    pub fn render_str(&mut self, template: &str) -> Result<String> {
        let mut context = Context::new();
        for (key, value) in &self.variables {
            context.insert(key.clone(), value);
        }

        self.tera.render_str(template, &context).map_err(|e| {
            let error_detail = extract_tera_error_detail(&e);
            FlowError::TemplateRenderError(error_detail)
        })
    }

    /// ファイルを読み込んでテンプレート展開
    pub fn render_file(&mut self, path: &Path) -> Result<String> {
        let content = std::fs::read_to_string(path).map_err(|e| FlowError::IoError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        self.render_str(&content).map_err(|e| {
            // TemplateRenderErrorをファイル名付きのTemplateErrorに変換
            if let FlowError::TemplateRenderError(msg) = e {
                FlowError::TemplateError {
                    file: path.to_path_buf(),
                    message: msg,
                }
            } else {
                e
            }
        })
    }
}

impl Default for TemplateProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// クォートを除去するヘルパー関数
///
/// "value" → value
/// 'value' → value
/// value → value
fn strip_quotes(s: &str) -> &str {
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// Teraエラーから詳細情報を抽出
///
/// Teraのエラーメッセージを解析して、未定義変数などの具体的な情報を取得します。
fn extract_tera_error_detail(e: &tera::Error) -> String {
    use std::error::Error;

    // エラーチェーンを走査して詳細を収集
    let mut details = Vec::new();
    details.push(e.to_string());

    let mut source = e.source();
    while let Some(err) = source {
        details.push(err.to_string());
        source = err.source();
    }

    let full_error = details.join(" | ");

    // 変数名を抽出: "Variable `xxx` not found in context"
    if full_error.contains("not found in context")
        && let Some(start) = full_error.find("Variable `")
        && let Some(end) = full_error[start..].find("` not found")
    {
        let var_name = &full_error[start + 10..start + end];
        return format!(
            "未定義の変数: `{}`\nヒント: parameter で宣言し、--param または .env ファイルで値を指定してください",
            var_name
        );
    }

    full_error
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_variable_expansion() {
        let mut processor = TemplateProcessor::new();
        processor.add_variable("your_ip", serde_json::Value::String("10.1.2.3/32".to_string()));

        let template = r#"ingress protocol="tcp" port=22 source="{{ your_ip }}""#;
        let result = processor.render_str(template).unwrap();

        assert_eq!(result, r#"ingress protocol="tcp" port=22 source="10.1.2.3/32""#);
    }

    #[test]
    fn test_numeric_variable_outside_string() {
        let mut processor = TemplateProcessor::new();
        processor.add_variable("http_port", serde_json::json!(8080));

        let result = processor.render_str("port {{ http_port }}").unwrap();
        assert_eq!(result, "port 8080");
    }

    #[test]
    fn test_parameter_defaults_do_not_override() {
        let mut processor = TemplateProcessor::new();
        processor.add_variable("instance_type", serde_json::json!("t3.small"));

        processor.add_parameter_defaults(&[
            Parameter {
                name: "instance_type".to_string(),
                description: None,
                default: Some("t2.micro".to_string()),
            },
            Parameter {
                name: "health_path".to_string(),
                description: None,
                default: Some("/ping".to_string()),
            },
        ]);

        assert_eq!(
            processor.render_str("{{ instance_type }} {{ health_path }}").unwrap(),
            "t3.small /ping"
        );
    }

    #[test]
    fn test_check_parameters_missing() {
        let processor = TemplateProcessor::new();
        let parameters = vec![Parameter {
            name: "your_ip".to_string(),
            description: Some("Your IP".to_string()),
            default: None,
        }];

        match processor.check_parameters(&parameters) {
            Err(FlowError::MissingParameter(name, env_name)) => {
                assert_eq!(name, "your_ip");
                assert_eq!(env_name, "YOUR_IP");
            }
            other => panic!("Expected MissingParameter, got {:?}", other),
        }
    }

    #[test]
    fn test_undefined_variable_error() {
        let mut processor = TemplateProcessor::new();

        let result = processor.render_str("source \"{{ undefined_var }}\"");
        let err_msg = result.unwrap_err().to_string();
        assert!(
            err_msg.contains("undefined_var"),
            "エラーメッセージに変数名が含まれていません: {}",
            err_msg
        );
    }

    #[test]
    fn test_env_variables_filtering() {
        temp_env::with_vars(
            [
                ("STACK_YOUR_IP", Some("192.0.2.10/32")),
                ("STACK_", Some("ignored")),
                ("SECRET_KEY", Some("should_not_be_included")),
            ],
            || {
                let mut processor = TemplateProcessor::new();
                processor.add_env_variables();

                // プレフィックスを除いた小文字名で参照できる
                assert_eq!(
                    processor.render_str("{{ your_ip }}").unwrap(),
                    "192.0.2.10/32"
                );

                // 許可されていない変数は展開できない
                assert!(!processor.has_variable("secret_key"));
                assert!(!processor.has_variable("SECRET_KEY"));
                assert!(processor.render_str("{{ SECRET_KEY }}").is_err());
            },
        );
    }

    #[test]
    fn test_env_file_variables() {
        let temp_dir = tempfile::tempdir().unwrap();
        let env_file = temp_dir.path().join(".env");

        std::fs::write(
            &env_file,
            r#"
# コメント行
your_ip=198.51.100.7/32
instance_type="t3.micro"
QUOTED_SINGLE='single quoted'
EMPTY_VALUE=
"#,
        )
        .unwrap();

        let mut processor = TemplateProcessor::new();
        processor.add_env_file_variables(&env_file).unwrap();

        assert_eq!(
            processor.render_str("{{ your_ip }}").unwrap(),
            "198.51.100.7/32"
        );
        // ダブルクォートが除去されている
        assert_eq!(
            processor.render_str("{{ instance_type }}").unwrap(),
            "t3.micro"
        );
        assert_eq!(
            processor.render_str("{{ QUOTED_SINGLE }}").unwrap(),
            "single quoted"
        );
        assert_eq!(processor.render_str("{{ EMPTY_VALUE }}").unwrap(), "");
    }

    #[test]
    fn test_render_file_error_has_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("stack.kdl");
        std::fs::write(&path, "source \"{{ nope }}\"").unwrap();

        let mut processor = TemplateProcessor::new();
        match processor.render_file(&path) {
            Err(FlowError::TemplateError { file, .. }) => assert_eq!(file, path),
            other => panic!("Expected TemplateError, got {:?}", other),
        }
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"hello\""), "hello");
        assert_eq!(strip_quotes("'hello'"), "hello");
        assert_eq!(strip_quotes("hello"), "hello");
        assert_eq!(strip_quotes("\"hello"), "\"hello"); // 不完全なクォート
        assert_eq!(strip_quotes("\""), "\"");
        assert_eq!(strip_quotes(""), "");
    }
}
