pub mod db;
pub mod fetcher;
pub mod gemini;
pub mod imaging;
pub mod storage;

pub use db::DbAdapter;
pub use fetcher::{AssetFetcher, HttpFetcher};
pub use gemini::GeminiAdapter;
pub use imaging::ImageCrateProcessor;
pub use storage::S3ObjectStore;
