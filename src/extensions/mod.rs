pub mod path_ext;
pub mod value_ext;
