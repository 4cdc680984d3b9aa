use crate::SourceArgs;
use colored::Colorize;
use stackflow_config::{STACK_FILE_ENV, Settings};
use stackflow_core::{StackFile, Variables};
use stackflow_plan::{Finding, Severity, SynthError, Synthesis};
use std::path::{Path, PathBuf};

/// 読み込んだスタックと設定
pub struct LoadedStack {
    pub stack: StackFile,
    pub settings: Settings,
    /// 読み込み元（プロジェクトルートまたはファイル）
    pub origin: PathBuf,
}

/// `--param KEY=VALUE` をパースする
pub fn parse_param(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("KEY=VALUE 形式で指定してください: {}", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("パラメータ名が空です: {}", s));
    }
    Ok((key.to_string(), value.to_string()))
}

fn overrides(params: &[(String, String)]) -> Variables {
    params
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect()
}

/// スタックを読み込む
///
/// 以下の優先順位で読み込み元を決める:
/// 1. --file
/// 2. 環境変数 STACKFLOW_FILE
/// 3. プロジェクトルートの自動検出
pub fn load(source: &SourceArgs) -> anyhow::Result<LoadedStack> {
    let overrides = overrides(&source.params);

    let (stack, origin, settings_root) = if let Some(file) = &source.file {
        let stack = stackflow_core::load_stack_file(file, &overrides)?;
        (stack, file.clone(), file.parent().map(Path::to_path_buf))
    } else if std::env::var_os(STACK_FILE_ENV).is_some() {
        let file = stackflow_config::find_stack_file()?;
        let stack = stackflow_core::load_stack_file(&file, &overrides)?;
        let root = file.parent().map(Path::to_path_buf);
        (stack, file, root)
    } else {
        let root = stackflow_core::find_project_root()?;
        let stack = stackflow_core::load_project_from_root(&root, &overrides)?;
        (stack, root.clone(), Some(root))
    };

    let settings = stackflow_config::load_settings(settings_root.as_deref())?;
    tracing::debug!(origin = %origin.display(), ?settings, "Stack source resolved");

    Ok(LoadedStack {
        stack,
        settings,
        origin,
    })
}

/// 宣言を順に登録して合成を準備する
pub fn synthesis_from(stack: StackFile) -> Result<Synthesis, SynthError> {
    let mut synthesis = Synthesis::new(stack.name);
    for decl in stack.declarations {
        synthesis.declare(decl.kind, decl.name, decl.properties)?;
    }
    Ok(synthesis)
}

/// 指摘事項を stderr に表示
pub fn print_findings(findings: &[Finding]) {
    for finding in findings {
        let label = match finding.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
        };
        eprintln!(
            "  {} [{}] {}: {}",
            label,
            finding.rule.id().dimmed(),
            finding.resource.cyan(),
            finding.message
        );
    }
}

/// 合成の失敗を表示
pub fn print_synth_error(err: &SynthError) {
    eprintln!();
    eprintln!(
        "{} ({} ステージ)",
        "✗ 合成に失敗しました".red().bold(),
        err.stage
    );
    let findings = err.error.findings();
    if findings.is_empty() {
        eprintln!("  {}", err.error);
    } else {
        print_findings(findings);
    }
}
