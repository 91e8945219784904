mod error;
pub use error::PmtilesError;

mod source;
pub use source::PmtilesSource;
