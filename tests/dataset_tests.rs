//! Dataset directory tests

use std::sync::Arc;

use arrow::array::{AsArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::DataType;
use owid_catalog::dataset::{Dataset, DatasetError};
use owid_catalog::io::Format;
use owid_catalog::meta::{Channel, DatasetMeta, Origin, ProcessingLevel, TableMeta, VariableMeta};
use owid_catalog::table::{Table, Variable};
use tempfile::TempDir;

fn dataset_meta() -> DatasetMeta {
    DatasetMeta::new(Channel::Garden, "un", "2024-07-12", "un_wpp").with_title("World Population Prospects")
}

fn population_table(origin: Option<Origin>) -> Table {
    let mut meta = VariableMeta::new()
        .with_title("Population")
        .with_unit("people", None)
        .with_processing_level(ProcessingLevel::Minor);
    if let Some(origin) = origin {
        meta = meta.with_origin(origin);
    }
    let country = Variable::new(
        "country",
        Arc::new(StringArray::from(vec!["France", "Spain"])),
        VariableMeta::new(),
    );
    let year = Variable::new("year", Arc::new(Int64Array::from(vec![2023, 2023])), VariableMeta::new());
    let population = Variable::new(
        "population",
        Arc::new(Float64Array::from(vec![68_170_000.0, 48_370_000.0])),
        meta,
    );
    Table::from_variables(vec![country, year, population])
        .unwrap()
        .with_metadata(TableMeta::new("population").with_title("Population"))
        .with_primary_key(&["country", "year"])
        .unwrap()
}

#[test]
fn test_add_and_read_table() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("garden/un/2024-07-12/un_wpp");
    let mut dataset = Dataset::create(&path, dataset_meta()).unwrap();

    let table = population_table(Some(Origin::new("United Nations")));
    dataset.add(&table).unwrap();

    assert!(path.join("index.json").exists());
    assert!(path.join("population.feather").exists());
    assert!(path.join("population.meta.json").exists());
    assert_eq!(dataset.table_names().unwrap(), vec!["population".to_string()]);

    let loaded = dataset.read("population").unwrap();
    assert_eq!(loaded.fields(), table.fields());
    assert_eq!(loaded.primary_key(), table.primary_key());
    assert_eq!(loaded.metadata.dataset, Some(dataset_meta()));

    let reopened = Dataset::load(&path).unwrap();
    assert_eq!(reopened.metadata, dataset_meta());
    assert!(!reopened.is_frozen());
}

#[test]
fn test_add_requires_short_name() {
    let temp = TempDir::new().unwrap();
    let mut dataset = Dataset::create(temp.path(), dataset_meta()).unwrap();

    let mut table = population_table(Some(Origin::new("United Nations")));
    table.metadata.short_name = None;
    assert!(matches!(dataset.add(&table), Err(DatasetError::MissingShortName)));

    table.metadata.short_name = Some("Population Table".to_string());
    assert!(matches!(dataset.add(&table), Err(DatasetError::InvalidName(_))));
}

#[test]
fn test_formats_are_written_and_read_in_preference_order() {
    let temp = TempDir::new().unwrap();
    let mut dataset = Dataset::create(temp.path(), dataset_meta())
        .unwrap()
        .with_formats(&[Format::Parquet, Format::Csv])
        .unwrap();
    dataset
        .add(&population_table(Some(Origin::new("United Nations"))))
        .unwrap();

    assert!(dataset.table_path("population", Format::Parquet).exists());
    assert!(dataset.table_path("population", Format::Csv).exists());
    assert!(!dataset.table_path("population", Format::Feather).exists());

    let reopened = Dataset::load(temp.path()).unwrap();
    assert_eq!(reopened.formats(), &[Format::Parquet, Format::Csv]);
    let loaded = reopened.read("population").unwrap();
    assert_eq!(loaded.num_rows(), 2);
    assert!(matches!(
        reopened.read("gdp"),
        Err(DatasetError::TableNotFound(name)) if name == "gdp"
    ));
}

#[test]
fn test_publish_freezes_dataset() {
    let temp = TempDir::new().unwrap();
    let mut dataset = Dataset::create(temp.path(), dataset_meta()).unwrap();
    let table = population_table(Some(Origin::new("United Nations")));
    dataset.add(&table).unwrap();

    dataset.publish().unwrap();
    assert!(dataset.is_frozen());
    assert!(dataset.published_at().is_some());
    assert!(matches!(dataset.add(&table), Err(DatasetError::Frozen(_))));
    assert!(matches!(dataset.save(), Err(DatasetError::Frozen(_))));

    let reopened = Dataset::load(temp.path()).unwrap();
    assert!(reopened.is_frozen());
    assert!(matches!(
        Dataset::create(temp.path(), dataset_meta()),
        Err(DatasetError::Frozen(_))
    ));
}

#[test]
fn test_publish_rejects_missing_provenance() {
    let temp = TempDir::new().unwrap();
    let mut dataset = Dataset::create(temp.path(), dataset_meta()).unwrap();
    dataset.add(&population_table(None)).unwrap();

    let result = dataset.publish();
    assert!(matches!(result, Err(DatasetError::ValidationFailed(ref m)) if m.contains("population")));
    assert!(!dataset.is_frozen());
    assert!(!Dataset::load(temp.path()).unwrap().is_frozen());
}

#[test]
fn test_checksum_tracks_content() {
    let temp = TempDir::new().unwrap();
    let mut dataset = Dataset::create(temp.path(), dataset_meta()).unwrap();
    dataset
        .add(&population_table(Some(Origin::new("United Nations"))))
        .unwrap();

    let first = dataset.checksum().unwrap();
    assert_eq!(first.len(), 64);
    assert_eq!(first, dataset.checksum().unwrap());

    dataset
        .add(&population_table(Some(Origin::new("Gapminder"))))
        .unwrap();
    assert_ne!(first, dataset.checksum().unwrap());
}

#[test]
fn test_save_refreshes_dataset_metadata() {
    let temp = TempDir::new().unwrap();
    let mut dataset = Dataset::create(temp.path(), dataset_meta()).unwrap();
    dataset
        .add(&population_table(Some(Origin::new("United Nations"))))
        .unwrap();

    dataset.metadata.description = Some("Population estimates and projections.".to_string());
    dataset.save().unwrap();

    let loaded = dataset.read("population").unwrap();
    assert_eq!(
        loaded.metadata.dataset.unwrap().description.as_deref(),
        Some("Population estimates and projections.")
    );
}

#[test]
fn test_update_metadata_from_yaml() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("un_wpp");
    let mut dataset = Dataset::create(&dir, dataset_meta()).unwrap();
    dataset.add(&population_table(None)).unwrap();

    let yaml_path = temp.path().join("un_wpp.meta.yml");
    std::fs::write(
        &yaml_path,
        r#"
definitions:
  common:
    origins:
      - producer: United Nations
        title: World Population Prospects
dataset:
  update_period_days: 365
tables:
  population:
    title: Total population
    variables:
      population:
        description_short: Total number of people living in a country.
  gdp:
    title: Missing table
"#,
    )
    .unwrap();

    dataset.update_metadata_from_yaml(&yaml_path).unwrap();
    assert_eq!(dataset.metadata.update_period_days, Some(365));
    assert_eq!(dataset.metadata.title.as_deref(), Some("World Population Prospects"));

    let table = dataset.read("population").unwrap();
    assert_eq!(table.metadata.title.as_deref(), Some("Total population"));
    let population = table.field("population").unwrap();
    assert_eq!(population.origins[0].producer, "United Nations");
    assert_eq!(
        population.description_short.as_deref(),
        Some("Total number of people living in a country.")
    );
    // common definitions skip primary key columns
    assert!(table.field("country").unwrap().origins.is_empty());

    dataset.publish().unwrap();
}

#[test]
fn test_save_keeps_column_types_when_csv_is_preferred() {
    let temp = TempDir::new().unwrap();
    let mut dataset = Dataset::create(temp.path(), dataset_meta())
        .unwrap()
        .with_formats(&[Format::Csv, Format::Feather])
        .unwrap();

    let codes = Table::from_variables(vec![
        Variable::new(
            "code",
            Arc::new(StringArray::from(vec!["001", "002"])),
            VariableMeta::new().with_title("Area code"),
        ),
        Variable::new(
            "population",
            Arc::new(Float64Array::from(vec![1.5, 2.5])),
            VariableMeta::new().with_origin(Origin::new("United Nations")),
        ),
    ])
    .unwrap()
    .with_metadata(TableMeta::new("codes"))
    .with_primary_key(&["code"])
    .unwrap();
    dataset.add(&codes).unwrap();

    dataset.metadata.description = Some("Refreshed.".to_string());
    dataset.save().unwrap();

    let feather = owid_catalog::io::read_table(&dataset.table_path("codes", Format::Feather)).unwrap();
    assert_eq!(feather.column("code").unwrap().data_type(), &DataType::Utf8);
    let code = feather.column("code").unwrap().as_string::<i32>();
    assert_eq!(code.value(0), "001");
    assert_eq!(
        feather.metadata.dataset.unwrap().description.as_deref(),
        Some("Refreshed.")
    );
}
