pub mod http_renderer;
pub mod ocr_client;

pub use http_renderer::HttpCardRenderer;
pub use ocr_client::HttpOcrClient;
