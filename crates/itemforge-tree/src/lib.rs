mod tree;

pub use tree::{
    TreeError, TreeReader, TreeResult, TreeWriter, ESCAPE, NODE_END, NODE_START,
};
