//! End-to-end transform scenarios on small fixtures.

use std::collections::BTreeMap;
use std::sync::Arc;

use batchprep_model::{Batch, Sentinel, Value};
use batchprep_transform::{
    CategoricalEncoder, EnrichJoin, ImputeColumn, Imputer, MissingFiller, ReferenceIndex,
    RowFilter, StatisticsAccumulator,
};

fn column(batch: &Batch, name: &str) -> Vec<String> {
    batch
        .column_values(name)
        .map(|v| v.render().into_owned())
        .collect()
}

#[test]
fn age_sentinel_is_replaced_by_mode() {
    let mut batch = Batch::from_str_rows(&["age"], &[&["?"], &["34"], &["34"], &["?"]]).unwrap();
    let columns = [ImputeColumn::mode("age", Sentinel::text("?"))];
    let (statistics, _) = StatisticsAccumulator::from_batch(&columns, &batch);
    Imputer::new(columns.to_vec()).apply(&mut batch, &statistics);
    assert_eq!(column(&batch, "age"), vec!["34", "34", "34", "34"]);
}

#[test]
fn colors_encode_in_first_seen_order() {
    let mut batch =
        Batch::from_str_rows(&["color"], &[&["red"], &["blue"], &["red"], &["green"]]).unwrap();
    let mut encoder = CategoricalEncoder::new(vec!["color".to_string()]);
    encoder.encode(&mut batch);
    assert_eq!(column(&batch, "color"), vec!["0", "1", "0", "2"]);

    let table = encoder
        .mapping_table()
        .entries()
        .iter()
        .map(|e| format!("{},{},{}", e.column, e.original_value, e.encoded_value))
        .collect::<Vec<_>>()
        .join("\n");
    insta::assert_snapshot!(table, @r"
    color,red,0
    color,blue,1
    color,green,2
    ");
}

#[test]
fn duplicate_reference_keys_keep_last() {
    let reference =
        Batch::from_str_rows(&["key", "label"], &[&["1", "A"], &["1", "B"]]).unwrap();
    let (_, schema, rows) = reference.into_parts();
    let index = ReferenceIndex::build(&schema, rows, "key", &["label".to_string()]).unwrap();
    assert_eq!(index.lookup("1"), Some(&[Value::text("B")][..]));
}

#[test]
fn cleaning_chain_fills_enriches_then_filters() {
    let reference = Batch::from_str_rows(
        &["disasterNumber", "incidentType"],
        &[&["10", "Flood"], &["11", "Fire"]],
    )
    .unwrap();
    let (_, schema, rows) = reference.into_parts();
    let index = Arc::new(
        ReferenceIndex::build(&schema, rows, "disasterNumber", &["incidentType".to_string()])
            .unwrap(),
    );

    let mut batch = Batch::from_str_rows(
        &["disasterNumber", "county"],
        &[&["10", ""], &["12", "Polk"], &["11", "Lee"]],
    )
    .unwrap();

    let filled = MissingFiller::default()
        .with_excluded(vec!["incidentType".to_string()])
        .fill(&mut batch);
    assert_eq!(filled.get("county"), Some(&1));

    let join = EnrichJoin::new(
        "disasterNumber",
        vec!["incidentType".to_string()],
        BTreeMap::from([("incidentType".to_string(), "Unknown".to_string())]),
        index,
    );
    let enriched = join.apply(&mut batch);
    assert_eq!((enriched.matched, enriched.unmatched), (2, 1));

    let filter = RowFilter::new(
        vec!["incidentType".to_string(), "county".to_string()],
        Sentinel::text("Unknown"),
    );
    let outcome = filter.apply(&mut batch);
    assert_eq!(outcome.dropped, 2);
    assert_eq!(column(&batch, "county"), vec!["Lee"]);
    assert_eq!(column(&batch, "incidentType"), vec!["Fire"]);
}
