use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use arrow_array::builder::{ListBuilder, StringBuilder};
use arrow_array::{Array, ArrayRef, ListArray, RecordBatch, StringArray, UInt64Array};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use chrono::NaiveDate;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use tracing::info;

use crate::config::RunConfig;
use crate::error::{Result, ScraperError};
use crate::types::ItemRecord;

pub const DATE_DIR_FORMAT: &str = "%d-%m-%Y";

pub fn load_config(root: &str) -> anyhow::Result<RunConfig> {
    load_config_from(&PathBuf::from(root).join("tracking/scraper.yml"))
}

/// Missing file means defaults; a file that exists must parse.
pub fn load_config_from(path: &Path) -> anyhow::Result<RunConfig> {
    if !path.exists() {
        return Ok(RunConfig::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {:?}", path))?;

    let config: RunConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config YAML {:?}", path))?;

    Ok(config)
}

/// `<base>/<dd-mm-yyyy>/<name>`; one artifact per calendar day.
pub fn output_path(base: &Path, date: NaiveDate, name: &str) -> PathBuf {
    base.join(date.format(DATE_DIR_FORMAT).to_string()).join(name)
}

pub fn todays_output_path(base: &Path, name: &str) -> PathBuf {
    output_path(base, chrono::Local::now().date_naive(), name)
}

fn record_schema() -> SchemaRef {
    let tag_list = DataType::List(Arc::new(Field::new("item", DataType::Utf8, true)));
    Arc::new(Schema::new(vec![
        Field::new("item_id", DataType::Utf8, true),
        Field::new("display_name", DataType::Utf8, true),
        Field::new("handle", DataType::Utf8, true),
        Field::new("username", DataType::Utf8, true),
        Field::new("timestamp_iso", DataType::Utf8, true),
        Field::new("timestamp_relative", DataType::Utf8, true),
        Field::new("content", DataType::Utf8, false),
        Field::new("hashtags", tag_list.clone(), false),
        Field::new("mentions", tag_list, false),
        Field::new("reply_count", DataType::UInt64, true),
        Field::new("retweet_count", DataType::UInt64, true),
        Field::new("like_count", DataType::UInt64, true),
        Field::new("view_count", DataType::UInt64, true),
        Field::new("_queried_hashtag", DataType::Utf8, false),
    ]))
}

fn optional_strings<'a>(records: &'a [ItemRecord], field: impl Fn(&'a ItemRecord) -> &'a Option<String>) -> ArrayRef {
    Arc::new(StringArray::from(
        records.iter().map(|r| field(r).as_deref()).collect::<Vec<_>>(),
    ))
}

fn counts(records: &[ItemRecord], field: impl Fn(&ItemRecord) -> Option<u64>) -> ArrayRef {
    Arc::new(UInt64Array::from(records.iter().map(field).collect::<Vec<_>>()))
}

fn tag_lists<'a>(records: &'a [ItemRecord], field: impl Fn(&'a ItemRecord) -> &'a Vec<String>) -> ArrayRef {
    let mut builder = ListBuilder::new(StringBuilder::new());
    for record in records {
        for value in field(record) {
            builder.values().append_value(value);
        }
        builder.append(true);
    }
    Arc::new(builder.finish())
}

fn records_to_batch(records: &[ItemRecord]) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        optional_strings(records, |r| &r.item_id),
        optional_strings(records, |r| &r.display_name),
        optional_strings(records, |r| &r.handle),
        optional_strings(records, |r| &r.username),
        optional_strings(records, |r| &r.timestamp_iso),
        optional_strings(records, |r| &r.timestamp_relative),
        Arc::new(StringArray::from(
            records.iter().map(|r| r.content.as_str()).collect::<Vec<_>>(),
        )),
        tag_lists(records, |r| &r.hashtags),
        tag_lists(records, |r| &r.mentions),
        counts(records, |r| r.reply_count),
        counts(records, |r| r.retweet_count),
        counts(records, |r| r.like_count),
        counts(records, |r| r.view_count),
        Arc::new(StringArray::from(
            records.iter().map(|r| r.queried_hashtag.as_str()).collect::<Vec<_>>(),
        )),
    ];

    Ok(RecordBatch::try_new(record_schema(), columns)?)
}

/// Write the aggregate dataset as one Parquet file. An empty slice still
/// produces a valid zero-row file with the full schema. The file is written
/// beside the target and renamed into place, so the artifact is either the
/// complete new dataset or untouched.
pub fn persist(records: &[ItemRecord], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let batch = records_to_batch(records)?;
    let tmp_path = path.with_extension("parquet.tmp");

    let written = (|| -> Result<()> {
        let file = File::create(&tmp_path)?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    fs::rename(&tmp_path, path)?;
    info!(rows = records.len(), path = %path.display(), "Parquet saved");
    Ok(())
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| ScraperError::Persist(format!("missing or mistyped column {}", name)))
}

fn string_at(array: &StringArray, row: usize) -> Option<String> {
    if array.is_null(row) {
        None
    } else {
        Some(array.value(row).to_string())
    }
}

fn count_at(array: &UInt64Array, row: usize) -> Option<u64> {
    if array.is_null(row) {
        None
    } else {
        Some(array.value(row))
    }
}

fn list_at(array: &ListArray, row: usize) -> Vec<String> {
    if array.is_null(row) {
        return Vec::new();
    }
    let values = array.value(row);
    match values.as_any().downcast_ref::<StringArray>() {
        Some(strings) => (0..strings.len()).filter_map(|i| string_at(strings, i)).collect(),
        None => Vec::new(),
    }
}

/// Read a persisted dataset back into records.
pub fn load_records(path: &Path) -> Result<Vec<ItemRecord>> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut records = Vec::new();
    for batch in reader {
        let batch = batch?;
        let item_id = column::<StringArray>(&batch, "item_id")?;
        let display_name = column::<StringArray>(&batch, "display_name")?;
        let handle = column::<StringArray>(&batch, "handle")?;
        let username = column::<StringArray>(&batch, "username")?;
        let timestamp_iso = column::<StringArray>(&batch, "timestamp_iso")?;
        let timestamp_relative = column::<StringArray>(&batch, "timestamp_relative")?;
        let content = column::<StringArray>(&batch, "content")?;
        let hashtags = column::<ListArray>(&batch, "hashtags")?;
        let mentions = column::<ListArray>(&batch, "mentions")?;
        let reply_count = column::<UInt64Array>(&batch, "reply_count")?;
        let retweet_count = column::<UInt64Array>(&batch, "retweet_count")?;
        let like_count = column::<UInt64Array>(&batch, "like_count")?;
        let view_count = column::<UInt64Array>(&batch, "view_count")?;
        let queried = column::<StringArray>(&batch, "_queried_hashtag")?;

        for row in 0..batch.num_rows() {
            records.push(ItemRecord {
                item_id: string_at(item_id, row),
                display_name: string_at(display_name, row),
                handle: string_at(handle, row),
                username: string_at(username, row),
                timestamp_iso: string_at(timestamp_iso, row),
                timestamp_relative: string_at(timestamp_relative, row),
                content: string_at(content, row).unwrap_or_default(),
                hashtags: list_at(hashtags, row),
                mentions: list_at(mentions, row),
                reply_count: count_at(reply_count, row),
                retweet_count: count_at(retweet_count, row),
                like_count: count_at(like_count, row),
                view_count: count_at(view_count, row),
                queried_hashtag: string_at(queried, row).unwrap_or_default(),
            });
        }
    }

    Ok(records)
}

/// Column names of a persisted artifact, in schema order.
pub fn artifact_columns(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    Ok(builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ItemRecord {
        ItemRecord {
            item_id: Some("42".to_string()),
            handle: Some("ferris".to_string()),
            username: Some("ferris".to_string()),
            content: "hello #rust".to_string(),
            hashtags: vec!["#rust".to_string()],
            like_count: Some(1200),
            queried_hashtag: "#rust".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_output_path_is_dated() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(
            output_path(Path::new("io"), date, "tweets.parquet"),
            PathBuf::from("io/07-03-2024/tweets.parquet")
        );
    }

    #[test]
    fn test_persist_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("day/tweets.parquet");

        let records = vec![sample(), ItemRecord::default()];
        persist(&records, &path).unwrap();

        let loaded = load_records(&path).unwrap();
        assert_eq!(loaded, records);
        assert!(!path.with_extension("parquet.tmp").exists());
    }

    #[test]
    fn test_empty_dataset_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tweets.parquet");

        persist(&[], &path).unwrap();

        assert!(load_records(&path).unwrap().is_empty());
        let columns = artifact_columns(&path).unwrap();
        assert_eq!(columns.len(), 14);
        assert_eq!(columns.first().map(String::as_str), Some("item_id"));
        assert_eq!(columns.last().map(String::as_str), Some("_queried_hashtag"));
    }

    #[test]
    fn test_rerun_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tweets.parquet");

        persist(&[sample(), sample()], &path).unwrap();
        persist(&[sample()], &path).unwrap();

        assert_eq!(load_records(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scraper.yml");
        fs::write(&path, "hashtags: [#rust\nper_tag_target: {oops").unwrap();
        assert!(load_config_from(&path).is_err());

        fs::write(&path, "per_tag_target: lots\n").unwrap();
        assert!(load_config_from(&path).is_err());
    }

    #[test]
    fn test_missing_config_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path().to_str().unwrap()).unwrap();
        assert!(config.hashtags.is_empty());
        assert_eq!(config.per_tag_target, 500);
    }
}
