pub mod book;
pub mod loaders;
pub mod page;
pub mod work_item;

pub use book::{normalize_isbn, BookInfo};
pub use loaders::{
    image_dir_for_json, json_path_for, load_project, read_import_marker, read_isbn, save_project,
    write_import_marker, write_isbn,
};
pub use page::{Page, Project};
pub use work_item::{number_items, WorkItem};
