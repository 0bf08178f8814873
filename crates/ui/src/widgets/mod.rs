pub mod preview;
pub mod timeline;
