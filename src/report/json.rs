use crate::analyze::AggregateReport;
use crate::report::ReportError;

pub trait JsonReport {
    fn to_json(&self) -> Result<String, ReportError>;
}

impl JsonReport for AggregateReport {
    fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
