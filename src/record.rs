use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Column order shared by the spreadsheet and the CSV representation.
pub const COLUMNS: [&str; 6] = ["studentId", "firstName", "lastName", "DOB", "class", "score"];

/// The canonical unit flowing through every pipeline stage.
///
/// `student_id` is the natural key for deduplication at the storage stage;
/// everything else is mutable presentation data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub student_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub class_name: String,
    pub score: i32,
}

impl StudentRecord {
    /// Fields in column order, dates rendered as ISO-8601.
    pub fn csv_fields(&self) -> [String; 6] {
        [
            self.student_id.to_string(),
            self.first_name.clone(),
            self.last_name.clone(),
            self.date_of_birth.format("%Y-%m-%d").to_string(),
            self.class_name.clone(),
            self.score.to_string(),
        ]
    }
}
