pub use self::{
    category::{CategoryStat, Dimension},
    engine::{IngestError, TabulationEngine},
    report::{percentage, write_report, ReportError, TOP_N},
    schema::{FieldKind, Schema, SchemaError},
};

mod category;
mod engine;
mod report;
mod schema;
