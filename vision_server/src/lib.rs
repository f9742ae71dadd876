use bytes::{BufMut, Bytes, BytesMut};

pub mod app;
pub mod capture;
pub mod config;
pub mod controls;
pub mod endpoints;
pub mod error;
pub mod loader;
pub mod models;
pub mod nn;
pub mod pages;
pub mod render;
pub mod utils;

/// Wrap a JPEG as part of a `multipart/x-mixed-replace` stream with boundary `frame`.
pub fn as_jpeg_stream_item(data: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(data.len() + 64);
    buf.put_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
    buf.put_slice(data);
    buf.put_slice(b"\r\n\r\n");
    buf.freeze()
}
