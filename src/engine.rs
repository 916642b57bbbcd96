use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io;

use crate::{CategoryStat, Dimension, FieldKind, Schema};

/// Possible errors to occur while streaming data rows into the engine
///
/// Ingestion is all-or-nothing: the first bad row aborts the run instead of
/// being skipped or defaulted.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("data row {row} is malformed")]
    Malformed {
        row: u64,
        #[source]
        source: csv::Error,
    },
    #[error("data row {row} is missing the {field} field")]
    MissingField { row: u64, field: FieldKind },
}

/// The central tabulation engine all application records are streamed through
///
/// The engine keeps one tally per distinct category and dimension, creating
/// tallies on the fly the first time a row mentions a category. Memory stays
/// proportional to the number of distinct categories, not to the input size.
#[derive(Debug, Default)]
pub struct TabulationEngine {
    /// Per-occupation tallies
    occupations: HashMap<String, CategoryStat>,
    /// Per-state tallies
    states: HashMap<String, CategoryStat>,
    /// Certified applications across the whole input
    ///
    /// Certification is a property of the record, not of a dimension, so
    /// this is bumped once per certified row and shared by both reports.
    total_certified: u64,
}

impl TabulationEngine {
    /// Creates a new, empty engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Certified applications seen so far
    pub fn total_certified(&self) -> u64 {
        self.total_certified
    }

    /// Distinct categories seen so far in the given dimension
    pub fn distinct(&self, dimension: Dimension) -> usize {
        self.tallies(dimension).len()
    }

    /// Tabulates one application record in both dimensions
    ///
    /// Empty field values are legitimate categories; no validation happens
    /// at this layer.
    pub fn record_case(&mut self, occupation: &str, worksite_state: &str, certified: bool) {
        Self::tally(&mut self.occupations, occupation, certified);
        Self::tally(&mut self.states, worksite_state, certified);
        if certified {
            self.total_certified += 1;
        }
    }

    /// Streams every data row of `reader` through the resolved schema
    ///
    /// An application counts as certified when its case-status field equals
    /// `certified`, ASCII case-insensitively. Returns the number of rows
    /// read.
    pub fn ingest<R: io::Read>(
        &mut self,
        reader: &mut csv::Reader<R>,
        schema: &Schema,
    ) -> Result<u64, IngestError> {
        let mut rows = 0;
        for record in reader.records() {
            rows += 1;
            let record = record.map_err(|source| IngestError::Malformed { row: rows, source })?;

            let occupation = schema.occupation(&record).ok_or(IngestError::MissingField {
                row: rows,
                field: FieldKind::Occupation,
            })?;
            let worksite_state =
                schema
                    .worksite_state(&record)
                    .ok_or(IngestError::MissingField {
                        row: rows,
                        field: FieldKind::WorksiteState,
                    })?;
            let certified = schema
                .case_status(&record)
                .ok_or(IngestError::MissingField {
                    row: rows,
                    field: FieldKind::CaseStatus,
                })?
                .eq_ignore_ascii_case("certified");

            self.record_case(occupation, worksite_state, certified);
        }

        Ok(rows)
    }

    /// All categories of a dimension, ordered by certified count descending,
    /// ties broken by name ascending
    pub fn ranked(&self, dimension: Dimension) -> Vec<&CategoryStat> {
        let mut stats = self.tallies(dimension).values().collect::<Vec<_>>();
        stats.sort_by(|a, b| {
            b.certified()
                .cmp(&a.certified())
                .then_with(|| a.name().cmp(b.name()))
        });
        stats
    }

    /// Merges the tallies of another engine into this one
    ///
    /// Shards of a split input can be aggregated independently and merged in
    /// any order; the result equals one pass over the whole input.
    pub fn merge(&mut self, other: TabulationEngine) {
        let TabulationEngine {
            occupations,
            states,
            total_certified,
        } = other;
        Self::absorb(&mut self.occupations, occupations);
        Self::absorb(&mut self.states, states);
        self.total_certified += total_certified;
    }

    fn tallies(&self, dimension: Dimension) -> &HashMap<String, CategoryStat> {
        match dimension {
            Dimension::Occupation => &self.occupations,
            Dimension::State => &self.states,
        }
    }

    fn tally(tallies: &mut HashMap<String, CategoryStat>, name: &str, certified: bool) {
        // get-then-insert instead of `entry`, which would clone the key on
        // every row
        match tallies.get_mut(name) {
            Some(stat) => stat.observe(certified),
            None => {
                let mut stat = CategoryStat::new(name.to_string());
                stat.observe(certified);
                tallies.insert(name.to_string(), stat);
            }
        }
    }

    fn absorb(tallies: &mut HashMap<String, CategoryStat>, other: HashMap<String, CategoryStat>) {
        for (name, stat) in other {
            match tallies.entry(name) {
                Entry::Vacant(vacant) => {
                    vacant.insert(stat);
                }
                Entry::Occupied(mut occupied) => occupied.get_mut().absorb(&stat),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader_from(input: &str) -> csv::Reader<&[u8]> {
        csv::ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(input.as_bytes())
    }

    fn engine_from(input: &str) -> TabulationEngine {
        let mut reader = reader_from(input);
        let schema = Schema::resolve(reader.headers().unwrap()).unwrap();
        let mut engine = TabulationEngine::new();
        engine.ingest(&mut reader, &schema).unwrap();
        engine
    }

    fn ranking(engine: &TabulationEngine, dimension: Dimension) -> Vec<(String, u64, u64)> {
        engine
            .ranked(dimension)
            .into_iter()
            .map(|stat| (stat.name().to_string(), stat.occurrences(), stat.certified()))
            .collect()
    }

    macro_rules! tabulation_test {
        (
            $name:ident
            $input:literal
            occupations: [$(($occ:literal, $occ_seen:literal, $occ_cert:literal)),* $(,)?]
            states: [$(($state:literal, $state_seen:literal, $state_cert:literal)),* $(,)?]
            total_certified: $total:literal
        ) => {
            #[test]
            fn $name() {
                let engine = engine_from($input);
                assert_eq!(
                    ranking(&engine, Dimension::Occupation),
                    vec![$(($occ.to_string(), $occ_seen, $occ_cert)),*],
                );
                assert_eq!(
                    ranking(&engine, Dimension::State),
                    vec![$(($state.to_string(), $state_seen, $state_cert)),*],
                );
                assert_eq!(engine.total_certified(), $total);
            }
        };
    }

    tabulation_test!(mixed_statuses
        r#"SOC_NAME;WORKSITE_STATE;CASE_STATUS
           ENGINEER;CA;Certified
           ENGINEER;CA;Certified
           ENGINEER;TX;Certified
           ENGINEER;NY;Denied
           ANALYST;WA;Certified
           ANALYST;WA;Certified"#
        occupations: [("ENGINEER", 4, 3), ("ANALYST", 2, 2)]
        states: [("CA", 2, 2), ("WA", 2, 2), ("TX", 1, 1), ("NY", 1, 0)]
        total_certified: 5
    );

    tabulation_test!(ties_break_alphabetically
        r#"SOC_NAME;WORKSITE_STATE;CASE_STATUS
           Zeta;ZZ;Certified
           Zeta;ZZ;Certified
           Alpha;AA;Certified
           Alpha;AA;Certified"#
        occupations: [("Alpha", 2, 2), ("Zeta", 2, 2)]
        states: [("AA", 2, 2), ("ZZ", 2, 2)]
        total_certified: 4
    );

    tabulation_test!(status_match_is_case_insensitive_and_exact
        r#"SOC_NAME;WORKSITE_STATE;CASE_STATUS
           ENGINEER;CA;CERTIFIED
           ENGINEER;CA;certified
           ENGINEER;CA;Certified
           ENGINEER;CA;CERTIFIED-WITHDRAWN
           ENGINEER;CA;
           ENGINEER;CA;Denied"#
        occupations: [("ENGINEER", 6, 3)]
        states: [("CA", 6, 3)]
        total_certified: 3
    );

    tabulation_test!(empty_category_values_are_categories
        r#"SOC_NAME;WORKSITE_STATE;CASE_STATUS
           ;CA;Certified
           ENGINEER;;Certified"#
        occupations: [("", 1, 1), ("ENGINEER", 1, 1)]
        states: [("", 1, 1), ("CA", 1, 1)]
        total_certified: 2
    );

    tabulation_test!(field_order_follows_the_header
        r#"CASE_STATUS;SOC_NAME;WORKSITE_STATE
           Certified;ENGINEER;CA"#
        occupations: [("ENGINEER", 1, 1)]
        states: [("CA", 1, 1)]
        total_certified: 1
    );

    #[test]
    fn occurrences_sum_to_row_count_and_certified_to_total() {
        let engine = engine_from(
            r#"SOC_NAME;WORKSITE_STATE;CASE_STATUS
               ENGINEER;CA;Certified
               ENGINEER;TX;Denied
               ANALYST;CA;Certified
               NURSE;NY;Withdrawn
               NURSE;NY;Certified"#,
        );

        for dimension in [Dimension::Occupation, Dimension::State] {
            let ranked = engine.ranked(dimension);
            let rows = ranked.iter().map(|stat| stat.occurrences()).sum::<u64>();
            let certified = ranked.iter().map(|stat| stat.certified()).sum::<u64>();
            assert_eq!(rows, 5);
            assert_eq!(certified, engine.total_certified());
        }
        assert_eq!(engine.total_certified(), 3);
    }

    #[test]
    fn malformed_row_aborts_with_its_row_number() {
        let input = r#"SOC_NAME;WORKSITE_STATE;CASE_STATUS
                       ENGINEER;CA;Certified
                       ENGINEER;CA"#;
        let mut reader = reader_from(input);
        let schema = Schema::resolve(reader.headers().unwrap()).unwrap();
        let mut engine = TabulationEngine::new();

        let err = engine.ingest(&mut reader, &schema).unwrap_err();
        assert!(matches!(err, IngestError::Malformed { row: 2, .. }));
    }

    #[test]
    fn short_row_from_a_flexible_reader_names_the_missing_field() {
        // a strict reader rejects short rows itself; a flexible one hands
        // them through and the engine has to notice the absent field
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(true)
            .flexible(true)
            .from_reader("SOC_NAME;WORKSITE_STATE;CASE_STATUS\nENGINEER;CA\n".as_bytes());
        let schema = Schema::resolve(reader.headers().unwrap()).unwrap();
        let mut engine = TabulationEngine::new();

        let err = engine.ingest(&mut reader, &schema).unwrap_err();
        assert!(matches!(
            err,
            IngestError::MissingField {
                row: 1,
                field: FieldKind::CaseStatus,
            }
        ));
    }

    #[test]
    fn merging_shards_equals_one_pass() {
        let whole = engine_from(
            r#"SOC_NAME;WORKSITE_STATE;CASE_STATUS
               ENGINEER;CA;Certified
               ANALYST;TX;Denied
               ANALYST;CA;Certified
               ENGINEER;WA;Certified"#,
        );
        let mut merged = engine_from(
            r#"SOC_NAME;WORKSITE_STATE;CASE_STATUS
               ENGINEER;CA;Certified
               ANALYST;TX;Denied"#,
        );
        merged.merge(engine_from(
            r#"SOC_NAME;WORKSITE_STATE;CASE_STATUS
               ANALYST;CA;Certified
               ENGINEER;WA;Certified"#,
        ));

        for dimension in [Dimension::Occupation, Dimension::State] {
            assert_eq!(ranking(&merged, dimension), ranking(&whole, dimension));
        }
        assert_eq!(merged.total_certified(), whole.total_certified());
    }
}
