use crate::SourceArgs;
use crate::utils;
use colored::Colorize;
use stackflow_plan::Policy;

pub fn handle(source: &SourceArgs) -> anyhow::Result<()> {
    eprintln!("{}", "スタックを検証中...".blue());

    let loaded = utils::load(source)?;
    eprintln!(
        "読み込み元: {}",
        loaded.origin.display().to_string().cyan()
    );
    let policy = loaded.settings.policy();

    // 指摘事項はすべて表示したいので、ここではブロックしない
    let result = utils::synthesis_from(loaded.stack)
        .and_then(|mut synthesis| synthesis.run(&Policy::report_only()));

    let document = match result {
        Ok(document) => document,
        Err(e) => {
            utils::print_synth_error(&e);
            std::process::exit(1);
        }
    };

    if !document.findings.is_empty() {
        eprintln!();
        eprintln!("指摘事項:");
        utils::print_findings(&document.findings);
    }

    eprintln!();
    eprintln!("サマリー: {}", document.summary());

    if policy.blocks(&document.findings) {
        eprintln!("{}", "✗ 検証に失敗しました".red().bold());
        std::process::exit(1);
    }

    println!("{}", "✓ スタックは正常です！".green().bold());
    Ok(())
}
