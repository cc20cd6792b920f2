use clap::{Parser, Subcommand};
use moban::config::MobanConfig;
use moban::engine::Engine;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "moban", about = "多语法多阶段模板编译引擎", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 编译模板并输出渲染程序
    Compile {
        /// 模板名（相对模板目录，不含扩展名）
        template: String,

        /// 项目根目录（默认当前目录）
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },

    /// 渲染模板到标准输出
    Render {
        /// 模板名（相对模板目录，不含扩展名）
        template: String,

        /// 渲染数据（JSON 文件）
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// 项目根目录（默认当前目录）
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },

    /// 检查模板目录（全部模板走一遍编译管道）
    Check {
        /// 项目根目录（默认当前目录）
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let root = match &cli.command {
        Commands::Compile { root, .. }
        | Commands::Render { root, .. }
        | Commands::Check { root } => root.canonicalize().unwrap_or_else(|_| root.clone()),
    };
    let config = MobanConfig::load_or_default(&root);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(config.engine.log_level.clone())
            }),
        )
        .init();

    match cli.command {
        Commands::Compile { template, .. } => {
            let mut engine = Engine::from_config(&root, &config);
            let program = engine.compile(&template)?;
            print!("{program}");
        }

        Commands::Render { template, data, .. } => {
            let data = match data {
                Some(path) => {
                    let json = std::fs::read_to_string(&path)
                        .map_err(|e| anyhow::anyhow!("读取 {} 失败：{e}", path.display()))?;
                    serde_json::from_str(&json)
                        .map_err(|e| anyhow::anyhow!("解析 {} 失败：{e}", path.display()))?
                }
                None => serde_json::Value::Object(Default::default()),
            };
            let mut engine = Engine::from_config(&root, &config);
            let output = engine.render(&template, &data)?;
            print!("{output}");
        }

        Commands::Check { root: _ } => {
            let result = moban::check::run(&root, &config)?;

            for w in &result.warnings {
                tracing::warn!("{w}");
            }
            for e in &result.errors {
                tracing::error!("{e}");
            }

            if result.errors.is_empty() {
                tracing::info!(
                    "检查通过：{} 个模板（{} 个警告）",
                    result.checked,
                    result.warnings.len()
                );
            } else {
                anyhow::bail!(
                    "检查未通过：{} 个错误，{} 个警告",
                    result.errors.len(),
                    result.warnings.len()
                );
            }
        }
    }

    Ok(())
}
