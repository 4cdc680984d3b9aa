use crate::SourceArgs;
use crate::utils;
use colored::Colorize;
use stackflow_plan::Policy;

pub fn handle(source: &SourceArgs) -> anyhow::Result<()> {
    let loaded = utils::load(source)?;

    // 作成順の表示に検証結果は関係しない
    let result = utils::synthesis_from(loaded.stack)
        .and_then(|mut synthesis| synthesis.run(&Policy::report_only()));

    let document = match result {
        Ok(document) => document,
        Err(e) => {
            utils::print_synth_error(&e);
            std::process::exit(1);
        }
    };

    println!("{} {}", "作成順:".bold(), document.stack.cyan());
    for (i, record) in document.resources.iter().enumerate() {
        let deps = if record.dependency_ids.is_empty() {
            String::new()
        } else {
            format!(" <- {}", record.dependency_ids.join(", "))
        };
        println!(
            "  {:>2}. {} ({}){}",
            i + 1,
            record.name,
            record.resource_type,
            deps.dimmed()
        );
    }

    Ok(())
}
