pub mod access;
pub mod address;
pub mod cell;
pub mod host;
pub mod workbook;
