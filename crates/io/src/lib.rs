// File I/O for reconciliation runs

pub mod csv;
pub mod loader;
pub mod sink;

pub use loader::CsvDirLoader;
pub use sink::CsvDirSink;
