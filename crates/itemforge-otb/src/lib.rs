mod attr;
mod document;
mod error;
mod reader;
mod writer;

pub use attr::{item_attr, root_attr, ROOT_NODE_TYPE, SIGNATURE};
pub use document::OtbDocument;
pub use error::{OtbError, OtbResult};
pub use reader::{is_valid_otb, OtbReader, ReadOptions, ReadStats};
pub use writer::OtbWriter;
