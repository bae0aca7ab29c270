use std::path::PathBuf;

use mdraw_config::{AppConfig, ConfigError};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

fn main() {
    let mut args = std::env::args().skip(1);
    let mut config_override: Option<PathBuf> = None;
    let mut document: Option<PathBuf> = None;
    let mut library_mode = false;
    let mut horizontal_pages: Option<u32> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let Some(path) = args.next() else {
                    eprintln!("`--config` 需要提供配置文件路径");
                    std::process::exit(1);
                };
                config_override = Some(PathBuf::from(path));
            }
            "--library" => library_mode = true,
            "--pages" => {
                let Some(count) = args.next().and_then(|value| value.parse::<u32>().ok()) else {
                    eprintln!("`--pages` 需要提供正整数");
                    std::process::exit(1);
                };
                horizontal_pages = Some(count);
            }
            other if other.starts_with("--") => {
                eprintln!("未知参数：{other}");
                std::process::exit(1);
            }
            path => {
                if document.replace(PathBuf::from(path)).is_some() {
                    eprintln!("只能指定一个文档");
                    std::process::exit(1);
                }
            }
        }
    }

    let Some(document) = document else {
        eprintln!("用法：mdraw [--config <配置文件>] [--library] [--pages <横向页数>] <文档>");
        std::process::exit(1);
    };

    let mut config = load_configuration(config_override);
    init_logging(&config);
    info!("启动 mdraw");

    config.layout.library_mode |= library_mode;
    if let Some(count) = horizontal_pages {
        config.layout.horizontal_pages = count;
    }

    if let Err(err) = mdraw_frontend::run_cli(&document, &config) {
        error!(error = %err, "处理文档失败");
        std::process::exit(1);
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(
                            path = %path.display(),
                            error = %err,
                            "加载默认配置失败，使用内建默认值"
                        );
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
