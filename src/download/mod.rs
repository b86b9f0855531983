/// Download orchestration: pointer acquisition, stream assembly, and byte-range slicing.
pub mod pointers;
pub mod slice;
pub mod stream;

pub use pointers::acquire_pointer_window;
pub use slice::{compute_slice_window, create_file_slice_stream, SliceWindow};
pub use stream::{create_file_stream, resolve_file_from_pointers};
