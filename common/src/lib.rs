//! Common code shared between `vision_server` and `cam_capture`.
pub mod media;
pub mod protocol;
pub mod status;
