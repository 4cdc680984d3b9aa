mod commands;
mod utils;

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stack")]
#[command(about = "宣言したインフラ構成を、検証済みのプランにする。", long_about = None)]
struct Cli {
    /// 詳細なログを表示 (RUST_LOG より優先)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// スタックの読み込み元
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// スタックファイル（省略時はプロジェクトを自動検出）
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// パラメータ値 (複数指定可)
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE", value_parser = utils::parse_param)]
    pub params: Vec<(String, String)>,
}

/// プランの出力形式
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    Json,
    Yaml,
}

#[derive(Subcommand)]
enum Commands {
    /// スタックを検証して指摘事項を表示
    Validate {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// プランを生成
    Plan {
        #[command(flatten)]
        source: SourceArgs,
        /// 出力形式 (省略時は設定ファイルの format、既定は json)
        #[arg(long, value_enum)]
        format: Option<FormatArg>,
        /// 出力先ファイル (省略時は標準出力)
        #[arg(short, long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
    /// リソースの作成順を表示
    Order {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// バージョン情報を表示
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ログは stderr に出力（stdout はプラン出力に使う）
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Validate { source } => commands::validate::handle(&source),
        Commands::Plan {
            source,
            format,
            out,
        } => commands::plan::handle(&source, format, out.as_deref()),
        Commands::Order { source } => commands::order::handle(&source),
        Commands::Version => {
            println!("stackflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
