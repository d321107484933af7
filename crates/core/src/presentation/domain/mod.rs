pub mod presentation_sink;
pub mod still_image;
pub mod still_writer;
