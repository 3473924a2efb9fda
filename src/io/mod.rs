mod fs;

pub use fs::{delete_directory, delete_file, ensure_dir, file_extension};
