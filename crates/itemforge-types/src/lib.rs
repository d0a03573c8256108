mod client;
mod progress;
mod server;

pub use client::{ClientItem, Sprite};
pub use progress::{Cancelled, ProgressSink};
pub use server::{
    flag, ItemRange, ListError, ServerItem, ServerItemList, ServerItemType, StackOrder,
    VersionInfo,
};
