use super::models::{ColumnSpec, CreateTableRequest};
use crate::common::validation::require_non_blank;
use crate::common::{ValidationResult, Validator};

impl Validator<CreateTableRequest> for CreateTableRequest {
    fn validate(&self, data: &CreateTableRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        if data.columns.is_empty() {
            result.add_error("columns", "Please add at least one column");
        }

        for column in &data.columns {
            result.merge(column.validate(column));
        }

        require_non_blank(
            &mut result,
            "source_locator",
            &data.source_locator,
            "Please enter a Google Spreadsheet URL",
        );

        result
    }
}

impl Validator<ColumnSpec> for ColumnSpec {
    fn validate(&self, data: &ColumnSpec) -> ValidationResult {
        let mut result = ValidationResult::new();
        require_non_blank(&mut result, "name", &data.name, "Please enter a column name");
        result
    }
}
