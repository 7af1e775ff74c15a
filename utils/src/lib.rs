pub mod audio;
pub mod frame;
