//! 統合ローダー
//!
//! ファイル発見、パラメータ収集、テンプレート展開、パースを統合

use crate::discovery::{discover_files, find_project_root};
use crate::error::{FlowError, Result};
use crate::model::{Parameter, StackFile};
use crate::parser::{extract_parameters, parse_kdl_string};
use crate::template::{TemplateProcessor, Variables};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// ファイルあたりの推定バイト数（容量事前確保用）
const ESTIMATED_BYTES_PER_FILE: usize = 500;

/// カレントディレクトリからプロジェクトを検出してロード
#[instrument(skip(overrides))]
pub fn load_project(overrides: &Variables) -> Result<StackFile> {
    info!("Starting project load");
    let project_root = find_project_root()?;
    load_project_from_root(&project_root, overrides)
}

/// 指定されたルートディレクトリからプロジェクトをロード
///
/// 以下の処理を実行:
/// 1. ファイルの自動発見
/// 2. parameter 宣言の収集
/// 3. パラメータ値の解決（default → .env → STACK_* → overrides）
/// 4. テンプレート展開
/// 5. KDLパース
#[instrument(skip(project_root, overrides), fields(project_root = %project_root.display()))]
pub fn load_project_from_root(project_root: &Path, overrides: &Variables) -> Result<StackFile> {
    debug!("Step 1: Discovering files");
    let discovered = discover_files(project_root)?;
    let files: Vec<PathBuf> = discovered
        .stack_files()
        .into_iter()
        .map(Path::to_path_buf)
        .collect();
    if files.is_empty() {
        return Err(FlowError::ProjectRootNotFound(project_root.to_path_buf()));
    }

    let name = project_root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();

    load_files(&files, discovered.env_file.as_deref(), name, overrides)
}

/// 単一のスタックファイルをロード
///
/// 同じディレクトリに .env があればパラメータ値として読み込む。
#[instrument(skip(path, overrides), fields(path = %path.display()))]
pub fn load_stack_file(path: &Path, overrides: &Variables) -> Result<StackFile> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let env_file = dir.join(".env");
    let env_file = env_file.exists().then_some(env_file);

    let name = dir
        .canonicalize()
        .ok()
        .as_deref()
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();

    load_files(&[path.to_path_buf()], env_file.as_deref(), name, overrides)
}

fn load_files(
    files: &[PathBuf],
    env_file: Option<&Path>,
    default_name: String,
    overrides: &Variables,
) -> Result<StackFile> {
    debug!("Step 2: Collecting parameters");
    let parameters = collect_parameters(files)?;

    debug!("Step 3: Resolving parameter values");
    let mut processor = prepare_template_processor(&parameters, env_file, overrides)?;

    debug!("Step 4: Expanding templates");
    let mut expanded = String::with_capacity(files.len() * ESTIMATED_BYTES_PER_FILE);
    for file in files {
        debug!(file = %file.display(), "Rendering stack file");
        let rendered = processor.render_file(file)?;
        expanded.push_str(&rendered);
        expanded.push_str("\n\n");
    }
    info!(
        content_size = expanded.len(),
        "Template expansion complete"
    );

    debug!("Step 5: Parsing KDL");
    let stack = parse_kdl_string(&expanded, default_name)?;
    info!(
        stack = %stack.name,
        resources = stack.declarations.len(),
        parameters = stack.parameters.len(),
        "Stack loaded successfully"
    );

    Ok(stack)
}

fn collect_parameters(files: &[PathBuf]) -> Result<Vec<Parameter>> {
    let mut parameters = Vec::new();
    for file in files {
        let content = std::fs::read_to_string(file).map_err(|e| FlowError::IoError {
            path: file.clone(),
            message: e.to_string(),
        })?;
        parameters.extend(extract_parameters(&content)?);
    }
    Ok(parameters)
}

/// テンプレートプロセッサを準備
///
/// 後から追加したものほど優先される。
fn prepare_template_processor(
    parameters: &[Parameter],
    env_file: Option<&Path>,
    overrides: &Variables,
) -> Result<TemplateProcessor> {
    let mut processor = TemplateProcessor::new();

    // 1. .env ファイル
    if let Some(env_file) = env_file {
        processor.add_env_file_variables(env_file)?;
    }

    // 2. 環境変数（STACK_* のみ）
    processor.add_env_variables();

    // 3. 明示的に指定された値（最優先）
    processor.add_variables(overrides.clone());

    // 4. 未指定のパラメータにデフォルト値を適用
    processor.add_parameter_defaults(parameters);

    processor.check_parameters(parameters)?;

    Ok(processor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ResourceKind, Value};
    use std::fs;

    const STACK: &str = r#"
stack "engineering"

parameter "your_ip" description="Your IP address in CIDR notation"
parameter "instance_type" default="t2.micro"

vpc "engineering-vpc" {
    cidr "10.0.0.0/18"
}

security-group "webserver-sg" {
    vpc (ref)"engineering-vpc"
    ingress protocol="tcp" port=22 source="{{ your_ip }}"
}
"#;

    fn overrides(pairs: &[(&str, &str)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect()
    }

    fn ssh_source(stack: &StackFile) -> Value {
        let sg = &stack.declarations[1];
        sg.properties.get("ingress").unwrap().as_map().unwrap()["source"].clone()
    }

    #[test]
    fn test_load_project_with_override() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("stack.kdl"), STACK)?;

        let stack = load_project_from_root(
            temp_dir.path(),
            &overrides(&[("your_ip", "203.0.113.5/32")]),
        )?;

        assert_eq!(stack.name, "engineering");
        assert_eq!(stack.parameters.len(), 2);
        assert_eq!(stack.declarations.len(), 2);
        assert_eq!(ssh_source(&stack), Value::from("203.0.113.5/32"));

        Ok(())
    }

    #[test]
    fn test_load_project_missing_parameter() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("stack.kdl"), STACK).unwrap();

        temp_env::with_var_unset("STACK_YOUR_IP", || {
            let result = load_project_from_root(temp_dir.path(), &Variables::new());
            assert!(matches!(result, Err(FlowError::MissingParameter(..))));
        });
    }

    #[test]
    fn test_load_project_parameter_from_env_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("stack.kdl"), STACK).unwrap();
        fs::write(temp_dir.path().join(".env"), "your_ip=198.51.100.1/32\n").unwrap();

        temp_env::with_var_unset("STACK_YOUR_IP", || {
            let stack = load_project_from_root(temp_dir.path(), &Variables::new()).unwrap();
            assert_eq!(ssh_source(&stack), Value::from("198.51.100.1/32"));

            // 明示的な指定は .env より優先される
            let stack = load_project_from_root(
                temp_dir.path(),
                &overrides(&[("your_ip", "203.0.113.9/32")]),
            )
            .unwrap();
            assert_eq!(ssh_source(&stack), Value::from("203.0.113.9/32"));
        });
    }

    #[test]
    fn test_load_project_parameter_from_environment() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("stack.kdl"), STACK).unwrap();

        temp_env::with_var("STACK_YOUR_IP", Some("192.0.2.44/32"), || {
            let stack = load_project_from_root(temp_dir.path(), &Variables::new()).unwrap();
            assert_eq!(ssh_source(&stack), Value::from("192.0.2.44/32"));
        });
    }

    #[test]
    fn test_load_project_with_resource_files() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();

        fs::write(
            root.join("stack.kdl"),
            r#"
stack "split"
parameter "instance_type" default="t2.micro"
vpc "main" { cidr "10.0.0.0/16"; }
"#,
        )?;
        fs::create_dir_all(root.join("resources"))?;
        fs::write(
            root.join("resources/compute.kdl"),
            r#"
instance "web1" {
    instance-type "{{ instance_type }}"
}
"#,
        )?;
        fs::write(
            root.join("resources/network.kdl"),
            r#"subnet "public-1" { vpc (ref)"main"; cidr "10.0.1.0/24"; }"#,
        )?;

        let stack = load_project_from_root(root, &Variables::new())?;

        let kinds: Vec<ResourceKind> = stack.declarations.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![ResourceKind::Vpc, ResourceKind::Instance, ResourceKind::Subnet]
        );
        assert_eq!(
            stack.declarations[1].properties.get("instance_type"),
            Some(&Value::from("t2.micro"))
        );

        Ok(())
    }

    #[test]
    fn test_load_stack_file() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("custom.kdl");
        fs::write(&path, STACK)?;

        let stack = load_stack_file(&path, &overrides(&[("your_ip", "10.9.8.7/32")]))?;
        assert_eq!(stack.declarations.len(), 2);
        assert_eq!(ssh_source(&stack), Value::from("10.9.8.7/32"));

        Ok(())
    }
}
