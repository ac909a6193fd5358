pub mod batch;
pub mod export;
pub mod filter;
pub mod io;
pub mod parser;
pub mod record;
pub mod report;
pub mod session;
pub mod stats;

pub mod prelude {
    pub use crate::batch::{BatchSize, Part, split_and_emit};
    pub use crate::export::{FormatKind, Naming, Payload};
    pub use crate::filter::{Criterion, FilterKind, HoldStatus, PhoneStatus};
    pub use crate::record::Record;
    pub use crate::session::{Session, SessionError};
    pub use crate::stats::Summary;
}
