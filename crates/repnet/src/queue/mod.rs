mod double_buffer;
mod envelope;
mod inbox;

pub use double_buffer::DoubleBuffer;
pub use envelope::{Outbound, Route};
pub use inbox::Inbox;
