pub mod cli;
pub mod errors;
pub mod loader;

use std::path::Path;

use errors::FrontendError;
use mdraw_config::AppConfig;
use tracing::info;

/// 加载文档并在终端输出区域概览。
pub fn run_cli(path: &Path, config: &AppConfig) -> Result<(), FrontendError> {
    info!(path = %path.display(), "启动 CLI 前端");
    cli::run(path, config)
}
