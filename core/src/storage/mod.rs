pub mod db;
pub mod writer;

pub use db::RocksChainState;
pub use writer::BlockWriter;
