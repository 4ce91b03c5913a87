// Reading and writing sessions built on the core primitives

pub mod bad_data;
pub mod detect;
pub mod encode;
pub mod parallel;
pub mod streaming;
pub mod writer;

pub use bad_data::{BadData, BadDataHandler, BadDataPolicy};
pub use detect::detect_delimiter;
pub use encode::{FieldContext, FieldEncoder};
pub use parallel::{read_all, read_all_parallel, recommended_threads};
pub use streaming::{Reader, Records};
pub use writer::Writer;
