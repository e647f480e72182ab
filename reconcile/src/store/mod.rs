mod base;
mod memory;
mod scan;

pub use base::TableStore;
pub use memory::MemoryStore;
pub use scan::RowScanner;
