pub mod json_loader;

pub use json_loader::{
    image_dir_for_json, json_path_for, load_project, read_import_marker, read_isbn, save_project,
    write_atomic, write_import_marker, write_isbn, IMPORT_MARKER, ISBN_MARKER, OCR_JSON_SUFFIX,
};
