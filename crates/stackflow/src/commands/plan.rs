use crate::utils;
use crate::{FormatArg, SourceArgs};
use colored::Colorize;
use stackflow_config::OutputFormat;
use std::path::Path;

pub fn handle(
    source: &SourceArgs,
    format: Option<FormatArg>,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let loaded = utils::load(source)?;
    let policy = loaded.settings.policy();

    // --format は設定ファイルより優先
    let format = format.unwrap_or(match loaded.settings.format {
        OutputFormat::Json => FormatArg::Json,
        OutputFormat::Yaml => FormatArg::Yaml,
    });

    let result = utils::synthesis_from(loaded.stack)
        .and_then(|mut synthesis| synthesis.run(&policy));

    let document = match result {
        Ok(document) => document,
        Err(e) => {
            utils::print_synth_error(&e);
            std::process::exit(1);
        }
    };

    // ブロックしなかった指摘事項は stderr へ
    if !document.findings.is_empty() {
        utils::print_findings(&document.findings);
    }

    let rendered = match format {
        FormatArg::Json => document.to_json()?,
        FormatArg::Yaml => document.to_yaml()?,
    };

    match out {
        Some(path) => {
            std::fs::write(path, &rendered)?;
            eprintln!(
                "{} {} ({})",
                "✓ プランを出力しました:".green().bold(),
                path.display().to_string().cyan(),
                document.summary()
            );
        }
        None => println!("{}", rendered),
    }

    Ok(())
}
