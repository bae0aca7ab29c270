use mdraw_engine::errors::EngineError;
use mdraw_io::IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("加载文档失败: {0}")]
    Load(#[from] IoError),
    #[error("处理区域图失败: {0}")]
    Engine(#[from] EngineError),
}
