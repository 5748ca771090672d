use super::*;
use crate::RagError;
use std::io::Write;
use tempfile::TempDir;

fn sample_record() -> ReviewRecord {
    ReviewRecord {
        drug_name: "Fluoxetine".to_string(),
        condition: "Depression".to_string(),
        gender: "Female".to_string(),
        age_group: "30-40".to_string(),
        time_on_drug: "6 months".to_string(),
        rating_overall: 9.0,
        review_text: "Helped me get back on my feet.".to_string(),
    }
}

#[test]
fn combined_text_format() {
    let record = sample_record();
    assert_eq!(
        record.combined_text(),
        "Drug Name: Fluoxetine | Condition: Depression | Gender: Female | Age Group: 30-40 \
         | Time on Drug: 6 months | Rating Overall: 9 | Review: Helped me get back on my feet."
    );
}

#[test]
fn combined_text_is_deterministic() {
    let record = sample_record();
    assert_eq!(record.combined_text(), record.combined_text());

    let same = sample_record();
    assert_eq!(record.combined_text(), same.combined_text());
}

#[test]
fn load_records_from_jsonl() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let corpus_path = temp_dir.path().join("reviews.jsonl");

    let mut file = std::fs::File::create(&corpus_path).expect("should create corpus file");
    writeln!(
        file,
        r#"{{"drug_name":"Fluoxetine","condition":"Depression","gender":"Female","age_group":"30-40","time_on_drug":"6 months","rating_overall":9.0,"review_text":"Helped a lot."}}"#
    )
    .expect("should write record");
    writeln!(file).expect("should write blank line");
    writeln!(
        file,
        r#"{{"drug_name":"Bupropion","condition":"Smoking Cessation","gender":"Male","age_group":"40-50","time_on_drug":"2 months","rating_overall":7.5,"review_text":"Cravings reduced."}}"#
    )
    .expect("should write record");

    let records = load_records(&corpus_path).expect("should load records");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].drug_name, "Fluoxetine");
    assert_eq!(records[1].drug_name, "Bupropion");
    assert_eq!(records[1].rating_overall, 7.5);
}

#[test]
fn missing_field_is_schema_error() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let corpus_path = temp_dir.path().join("reviews.jsonl");

    std::fs::write(
        &corpus_path,
        r#"{"drug_name":"Fluoxetine","condition":"Depression","gender":"Female"}"#,
    )
    .expect("should write corpus file");

    let err = load_records(&corpus_path).expect_err("should fail on missing fields");
    assert!(matches!(err, RagError::Schema(_)));
    assert!(err.to_string().contains("line 1"));
}

#[test]
fn empty_field_is_schema_error() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let corpus_path = temp_dir.path().join("reviews.jsonl");

    std::fs::write(
        &corpus_path,
        r#"{"drug_name":"","condition":"Depression","gender":"Female","age_group":"30-40","time_on_drug":"6 months","rating_overall":9.0,"review_text":"Fine."}"#,
    )
    .expect("should write corpus file");

    let err = load_records(&corpus_path).expect_err("should fail on empty drug_name");
    assert!(matches!(err, RagError::Schema(_)));
    assert!(err.to_string().contains("drug_name"));
}

#[test]
fn missing_file_is_io_error() {
    let err = load_records("/nonexistent/reviews.jsonl").expect_err("should fail");
    assert!(matches!(err, RagError::Io(_)));
}
