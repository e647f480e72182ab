mod key;
mod row;
mod value;

pub use key::{Key, KeyRange};
pub use row::TableRow;
pub use value::Value;
