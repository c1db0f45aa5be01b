pub mod config;
pub mod logging;
pub mod registry;
pub mod storage;
pub mod task;
pub mod url_model;

pub use registry::{RegistryError, RegistryEvent, RegistrySink, TaskRegistry};
pub use task::{DownloadTask, TaskEvent, TaskId, TaskObserver, TaskStatus, TransferOptions};
pub use url_model::{TaskUrl, UrlError};
