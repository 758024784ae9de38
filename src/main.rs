//! techtracer 命令行：扫描单个页面，或导出签名库快照

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use techtracer::{
    CategoryTable, ConfigManager, GlobalConfig, HttpPageProbe, PageProbe, ScanResponse,
    SignatureStore, SnapshotCache, TechnologyService,
};

#[derive(Parser, Debug)]
#[command(name = "techtracer", version, about = "网页技术栈指纹识别")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 扫描页面并输出 JSON 结果
    Scan {
        /// 目标 URL
        url: String,
        #[command(flatten)]
        db: DbArgs,
        /// 使用签名库快照，不访问分片源
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// 格式化输出
        #[arg(long)]
        pretty: bool,
    },
    /// 拉取全部分片并写入 MessagePack 快照
    Snapshot {
        /// 快照输出路径
        #[arg(long)]
        out: PathBuf,
        #[command(flatten)]
        db: DbArgs,
    },
}

#[derive(Args, Debug)]
struct DbArgs {
    /// 本地签名库目录
    #[arg(long)]
    local_db: Option<PathBuf>,
    /// 远程分片基础URL
    #[arg(long)]
    remote_base: Option<String>,
    /// GitHub代理URL
    #[arg(long)]
    gh_proxy: Option<String>,
    /// 分类表路径
    #[arg(long)]
    categories: Option<PathBuf>,
    /// 离线模式，只使用本地签名库
    #[arg(long)]
    offline: bool,
    /// HTTP 超时（秒）
    #[arg(long)]
    timeout: Option<u64>,
    /// 详细日志
    #[arg(short, long)]
    verbose: bool,
}

impl DbArgs {
    fn to_config(&self) -> GlobalConfig {
        let mut builder = ConfigManager::custom()
            .gh_proxy_url(self.gh_proxy.clone())
            .offline(self.offline)
            .verbose(self.verbose);

        if let Some(base) = &self.remote_base {
            builder = builder.remote_base_url(base.clone());
        }
        if let Some(dir) = &self.local_db {
            builder = builder
                .categories_path(self.categories.clone().unwrap_or_else(|| dir.join("categories.json")))
                .local_db_dir(dir.clone());
        } else if let Some(path) = &self.categories {
            builder = builder.categories_path(path.clone());
        }
        if let Some(timeout) = self.timeout {
            builder = builder.http_timeout(timeout);
        }
        builder.build()
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "techtracer=debug" } else { "techtracer=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Scan { url, db, snapshot, pretty } => {
            let config = db.to_config();
            init_logging(config.verbose);
            scan(&config, &url, snapshot, pretty).await
        }
        Command::Snapshot { out, db } => {
            let config = db.to_config();
            init_logging(config.verbose);
            export_snapshot(&config, out).await
        }
    }
}

async fn scan(config: &GlobalConfig, url: &str, snapshot: Option<PathBuf>, pretty: bool) -> Result<()> {
    let service = match snapshot {
        Some(path) => {
            let raw = SnapshotCache::load(&path)
                .await
                .with_context(|| format!("读取快照失败：{}", path.display()))?;
            let store = SignatureStore::preloaded(&raw).await;
            let categories = CategoryTable::load(&config.categories_path);
            TechnologyService::new(Arc::new(store), Arc::new(categories))
        }
        None => TechnologyService::from_config(config)?,
    };

    let client = HttpPageProbe::client(config)?;
    let response = match HttpPageProbe::fetch(client, url).await {
        Ok(probe) => service.scan(Some(&probe as &dyn PageProbe)).await,
        Err(e) => ScanResponse::error(e.to_string()),
    };

    let output = if pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{}", output);
    Ok(())
}

async fn export_snapshot(config: &GlobalConfig, out: PathBuf) -> Result<()> {
    let store = SignatureStore::from_config(config)?;
    let raw = store.fetch_partitions().await;
    SnapshotCache::save(&out, &raw)
        .await
        .with_context(|| format!("写入快照失败：{}", out.display()))?;
    info!("快照已写入：{}，技术数：{}", out.display(), raw.len());
    Ok(())
}
