pub mod csv;
pub mod reqif;
mod session;

pub use self::csv::{CSV_HEADER, CsvError, export_to_csv, import_from_csv};
pub use reqif::{ReqIfError, ReqIfExporter, export_to_reqif, import_from_reqif};
pub use session::{CONFIG_DIR, Format, Session, SessionError};
