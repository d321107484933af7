pub mod image_file_still_writer;
pub mod image_sequence_sink;
