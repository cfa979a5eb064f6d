pub mod backend;
pub mod driver;
pub mod records;

pub use driver::drive_file;
