use serde::{Deserialize, Deserializer};
use std::io::Read;

#[derive(Debug)]
pub(crate) struct GradeRow {
    pub(crate) line: u64,
    pub(crate) item_id: Option<String>,
    pub(crate) evaluator: Option<String>,
    pub(crate) score: Option<String>,
    pub(crate) feedback: Option<String>,
}

pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<Vec<GradeRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut rows = Vec::new();

    for record in csv_reader.records() {
        let record = record?;
        let line = record.position().map_or(0, csv::Position::line);
        let row: RawGradeRow = record.deserialize(Some(&headers))?;

        rows.push(GradeRow {
            line,
            item_id: row.item_id,
            evaluator: row.evaluator,
            score: row.score,
            feedback: row.feedback,
        });
    }

    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct RawGradeRow {
    #[serde(rename = "Item ID", default, deserialize_with = "empty_string_as_none")]
    item_id: Option<String>,
    #[serde(
        rename = "Evaluator",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    evaluator: Option<String>,
    #[serde(rename = "Score", default, deserialize_with = "empty_string_as_none")]
    score: Option<String>,
    #[serde(
        rename = "Feedback",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    feedback: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
