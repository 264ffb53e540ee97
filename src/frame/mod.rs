pub mod live;
pub mod mjpeg;
pub mod source;
pub mod still;

pub use live::LiveFeed;
pub use source::{EncodedImage, FrameSource};
pub use still::StillImage;
