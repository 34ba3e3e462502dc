pub(crate) mod biff8;
pub(crate) mod bytes;
pub(crate) mod cfb;
pub mod reader;
pub(crate) mod text;
pub(crate) mod xml;
pub(crate) mod zip;
