//! Binary value reader/writer pair used by every persistence format in the
//! workspace (egress tables, opportunity grids): encode to an in-memory
//! blob with a chosen byte order, then the caller writes the resulting
//! bytes to disk with plain `std::fs`.

mod value_reader;
mod value_reader_blob;
mod value_reader_slice;
mod value_writer;
mod value_writer_blob;

pub use value_reader::*;
pub use value_reader_blob::*;
pub use value_reader_slice::*;
pub use value_writer::*;
pub use value_writer_blob::*;
