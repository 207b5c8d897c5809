#![no_main]

use arbitrary::Arbitrary;
use jetdiff::event_index::EventIndex;
use jetdiff::matcher::{JetMatcher, MatchOutcome, MatchTolerance};
use jetdiff::record::{Column, ColumnStream, JetFields, JetRecord};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    tolerance: MatchTolerance,
    candidates: Vec<(i8, i8, f64, f64)>,
    reference: (i8, i8, f64, f64),
}

fuzz_target!(|input: Input| {
    let rows = &input.candidates;
    let stream = ColumnStream::from_columns(
        "fuzz",
        vec![
            ("event_no", Column::Int(rows.iter().map(|r| r.0 as i64).collect())),
            ("jet_no", Column::Int(rows.iter().map(|r| r.1 as i64).collect())),
            ("fj_eta", Column::Float(rows.iter().map(|r| r.2).collect())),
            ("fj_phi", Column::Float(rows.iter().map(|r| r.3).collect())),
            ("fj_mass", Column::Float(vec![100.0; rows.len()])),
        ],
    )
    .unwrap();
    let fields = JetFields::candidate_default();
    let index = EventIndex::build(&stream, &fields.event_id, None).unwrap();
    let matcher = JetMatcher::new(&stream, &fields, &index, input.tolerance);

    let (event, object, eta, phi) = input.reference;
    let reference = JetRecord {
        position: 0,
        event_id: event as i64,
        object_index: object as i64,
        eta,
        phi,
        mass: 100.0,
        pt: None,
    };
    // A consistent index never reports corruption
    if let MatchOutcome::Matched(jet) = matcher.find(&reference).unwrap() {
        assert_eq!(jet.event_id, reference.event_id);
        assert_eq!(jet.object_index, reference.object_index);
    }
});
