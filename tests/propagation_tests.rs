//! Metadata propagation tests

use std::sync::Arc;

use arrow::array::{Array, AsArray, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::Float64Type;
use owid_catalog::meta::{ConflictPolicy, MetaError, Origin, ProcessingLevel, TableMeta, VariableMeta};
use owid_catalog::table::{
    AggFunc, ConcatOptions, JoinType, MergeOptions, Table, TableError, Variable, concat, merge,
};

fn un_origin() -> Origin {
    Origin::new("United Nations")
        .with_title("World Population Prospects")
        .with_date_published("2024-07-11")
}

fn population_table() -> Table {
    let country = Variable::new(
        "country",
        Arc::new(StringArray::from(vec!["France", "France", "Spain", "Spain"])),
        VariableMeta::new().with_title("Country"),
    );
    let year = Variable::new(
        "year",
        Arc::new(Int64Array::from(vec![2000, 2001, 2000, 2001])),
        VariableMeta::new().with_title("Year"),
    );
    let population = Variable::new(
        "population",
        Arc::new(Float64Array::from(vec![60.9, 61.4, 40.5, 40.8])),
        VariableMeta::new()
            .with_title("Population")
            .with_unit("million people", Some("M"))
            .with_origin(un_origin())
            .with_processing_level(ProcessingLevel::Minor),
    );
    Table::from_variables(vec![country, year, population])
        .unwrap()
        .with_metadata(TableMeta::new("population").with_title("Population"))
        .with_primary_key(&["country", "year"])
        .unwrap()
}

fn gdp_table() -> Table {
    let country = Variable::new(
        "country",
        Arc::new(StringArray::from(vec!["France", "Spain", "Italy"])),
        VariableMeta::new().with_title("Country"),
    );
    let year = Variable::new(
        "year",
        Arc::new(Int64Array::from(vec![2000, 2000, 2000])),
        VariableMeta::new().with_title("Year"),
    );
    let gdp = Variable::new(
        "gdp",
        Arc::new(Float64Array::from(vec![1500.0, 600.0, 1200.0])),
        VariableMeta::new()
            .with_title("GDP")
            .with_unit("billion dollars", Some("$"))
            .with_origin(Origin::new("World Bank"))
            .with_processing_level(ProcessingLevel::Minor),
    );
    Table::from_variables(vec![country, year, gdp])
        .unwrap()
        .with_metadata(TableMeta::new("gdp"))
        .with_primary_key(&["country", "year"])
        .unwrap()
}

mod slicing_tests {
    use super::*;

    #[test]
    fn test_slice_and_head_keep_metadata() {
        let table = population_table();
        let sliced = table.slice(1, 2);
        assert_eq!(sliced.num_rows(), 2);
        assert_eq!(sliced.metadata, table.metadata);
        assert_eq!(sliced.fields(), table.fields());

        let head = table.head(1);
        assert_eq!(head.num_rows(), 1);
        assert_eq!(head.field("population"), table.field("population"));
    }

    #[test]
    fn test_filter_keeps_metadata() {
        let table = population_table();
        let mask = BooleanArray::from(vec![true, false, false, true]);
        let filtered = table.filter(&mask).unwrap();

        assert_eq!(filtered.num_rows(), 2);
        assert_eq!(filtered.fields(), table.fields());
        assert_eq!(filtered.primary_key(), table.primary_key());
        let values = filtered.column("population").unwrap().as_primitive::<Float64Type>();
        assert_eq!(values.values().to_vec(), vec![60.9, 40.8]);
    }

    #[test]
    fn test_select_drops_primary_key_of_removed_columns() {
        let table = population_table();
        let selected = table.select(&["country", "population"]).unwrap();
        assert_eq!(selected.primary_key(), &["country".to_string()]);
        assert_eq!(selected.field("population"), table.field("population"));

        let dropped = table.drop_columns(&["year"]).unwrap();
        assert_eq!(dropped.column_names(), vec!["country", "population"]);
        assert_eq!(dropped.field("population"), table.field("population"));
    }

    #[test]
    fn test_sort_keeps_metadata() {
        let table = population_table();
        let sorted = table.sort_by(&["year", "country"]).unwrap();
        assert_eq!(sorted.fields(), table.fields());
        let countries = sorted.column("country").unwrap().as_string::<i32>();
        assert_eq!(countries.value(0), "France");
        assert_eq!(countries.value(1), "Spain");
    }
}

mod combine_tests {
    use super::*;

    #[test]
    fn test_merge_keeps_each_side_metadata() {
        let merged = merge(&population_table(), &gdp_table(), &MergeOptions::default()).unwrap();

        assert_eq!(merged.column_names(), vec!["country", "year", "population", "gdp"]);
        assert_eq!(merged.num_rows(), 2);
        assert_eq!(
            merged.field("population").unwrap().origins,
            vec![un_origin()]
        );
        assert_eq!(
            merged.field("gdp").unwrap().origins,
            vec![Origin::new("World Bank")]
        );
        assert_eq!(merged.field("country").unwrap().title.as_deref(), Some("Country"));
        assert_eq!(merged.primary_key(), &["country".to_string(), "year".to_string()]);
    }

    #[test]
    fn test_outer_merge_fills_missing_rows() {
        let merged = merge(
            &population_table(),
            &gdp_table(),
            &MergeOptions::on(&["country", "year"]).with_how(JoinType::Outer),
        )
        .unwrap();

        assert_eq!(merged.num_rows(), 5);
        let gdp = merged.column("gdp").unwrap();
        assert_eq!(gdp.null_count(), 2);
        let population = merged.column("population").unwrap();
        assert_eq!(population.null_count(), 1);
    }

    #[test]
    fn test_merge_suffixes_shared_columns_and_logs_rename() {
        let left = population_table();
        let right = population_table();
        let merged = merge(&left, &right, &MergeOptions::on(&["country", "year"])).unwrap();

        assert!(merged.has_column("population_x"));
        assert!(merged.has_column("population_y"));
        let log = &merged.field("population_y").unwrap().processing_log;
        assert_eq!(log.roots("population_y"), vec!["population".to_string()]);
    }

    #[test]
    fn test_merge_conflicting_key_metadata() {
        let left = population_table();
        let mut right = gdp_table();
        right.field_mut("country").unwrap().title = Some("Entity".to_string());

        let merged = merge(&left, &right, &MergeOptions::default()).unwrap();
        assert_eq!(merged.field("country").unwrap().title, None);

        let result = merge(
            &left,
            &right,
            &MergeOptions::default().with_conflict_policy(ConflictPolicy::Error),
        );
        assert!(matches!(
            result,
            Err(TableError::Meta(MetaError::Conflict { ref field, .. })) if field == "title"
        ));
    }

    #[test]
    fn test_concat_unions_origins() {
        let first = population_table();
        let mut second = population_table();
        second
            .field_mut("population")
            .unwrap()
            .add_origin(Origin::new("Gapminder"));

        let combined = concat(&[&first, &second], &ConcatOptions::default()).unwrap();
        assert_eq!(combined.num_rows(), 8);
        let meta = combined.field("population").unwrap();
        assert_eq!(meta.origins, vec![un_origin(), Origin::new("Gapminder")]);
        assert_eq!(meta.title.as_deref(), Some("Population"));
        assert_eq!(meta.unit.as_deref(), Some("million people"));
    }

    #[test]
    fn test_concat_flags_conflicting_units() {
        let first = population_table();
        let mut second = population_table();
        second.field_mut("population").unwrap().unit = Some("people".to_string());

        let warned = concat(&[&first, &second], &ConcatOptions::default()).unwrap();
        assert_eq!(warned.field("population").unwrap().unit, None);

        let kept = concat(
            &[&first, &second],
            &ConcatOptions::default().with_conflict_policy(ConflictPolicy::KeepFirst),
        )
        .unwrap();
        assert_eq!(
            kept.field("population").unwrap().unit.as_deref(),
            Some("million people")
        );

        let failed = concat(
            &[&first, &second],
            &ConcatOptions::default().with_conflict_policy(ConflictPolicy::Error),
        );
        assert!(matches!(failed, Err(TableError::Meta(MetaError::Conflict { .. }))));
    }
}

mod reshape_tests {
    use super::*;

    #[test]
    fn test_groupby_escalates_and_logs() {
        let table = population_table();
        let totals = table
            .group_by(&["year"])
            .unwrap()
            .agg(&[("population", AggFunc::Sum)])
            .unwrap();

        assert_eq!(totals.column_names(), vec!["year", "population"]);
        assert_eq!(totals.num_rows(), 2);
        let meta = totals.field("population").unwrap();
        assert_eq!(meta.processing_level, Some(ProcessingLevel::Major));
        assert_eq!(meta.origins, vec![un_origin()]);
        assert!(meta.processing_log.has_derivations());

        let values = totals.column("population").unwrap().as_primitive::<Float64Type>();
        assert!((values.value(0) - 101.4).abs() < 1e-9);
        assert!((values.value(1) - 102.2).abs() < 1e-9);
    }

    #[test]
    fn test_melt_then_pivot_keeps_origins() {
        let table = population_table();
        let long = table
            .melt(&["country", "year"], None, "indicator", "value")
            .unwrap();
        assert_eq!(long.num_rows(), 4);
        assert_eq!(long.field("value").unwrap().origins, vec![un_origin()]);
        assert_eq!(
            long.primary_key(),
            &["country".to_string(), "year".to_string(), "indicator".to_string()]
        );

        let wide = long.pivot(&["country", "year"], "indicator", "value").unwrap();
        assert!(wide.has_column("population"));
        assert_eq!(wide.field("population").unwrap().origins, vec![un_origin()]);
    }
}

mod provenance_tests {
    use super::*;

    #[test]
    fn test_rename_chain_keeps_origin_and_roots() {
        let table = population_table()
            .rename(&[("population", "pop")])
            .unwrap()
            .rename(&[("pop", "population_total")])
            .unwrap();

        let meta = table.field("population_total").unwrap();
        assert_eq!(meta.origins, vec![un_origin()]);
        assert_eq!(meta.processing_log.len(), 2);
        assert_eq!(
            meta.processing_log.roots("population_total"),
            vec!["population".to_string()]
        );
    }

    #[test]
    fn test_recompute_keeps_all_inputs() {
        let merged = merge(&population_table(), &gdp_table(), &MergeOptions::default()).unwrap();
        let gdp = merged.variable("gdp").unwrap();
        let population = merged.variable("population").unwrap().rename("pop");
        let per_capita = gdp.div(&population, "gdp_per_capita").unwrap();

        let meta = &per_capita.metadata;
        assert_eq!(meta.origins, vec![Origin::new("World Bank"), un_origin()]);
        assert_eq!(meta.processing_level, Some(ProcessingLevel::Major));
        assert_eq!(meta.unit, None);
        assert_eq!(
            meta.processing_log.roots("gdp_per_capita"),
            vec!["gdp".to_string(), "population".to_string()]
        );

        let table = merged.with_column(per_capita).unwrap();
        assert!(table.field("gdp_per_capita").unwrap().has_provenance());
    }

    #[test]
    fn test_scalar_conversion_keeps_origin() {
        let table = population_table();
        let people = table
            .variable("population")
            .unwrap()
            .mul_scalar(1_000_000.0, "population")
            .unwrap();

        assert_eq!(people.metadata.origins, vec![un_origin()]);
        assert_eq!(people.metadata.processing_level, Some(ProcessingLevel::Minor));
        assert_eq!(people.metadata.unit, None);
        assert_eq!(people.metadata.processing_log.len(), 1);
    }
}
