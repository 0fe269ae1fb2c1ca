pub mod db;
pub mod local;
pub mod progress;
pub mod streak;

pub use db::DB;
pub use local::LocalBackend;
