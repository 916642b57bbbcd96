use std::fmt;

use csv::StringRecord;

/// The three logical fields every yearly input schema must provide
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Occupation,
    WorksiteState,
    CaseStatus,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Occupation => "occupation",
            FieldKind::WorksiteState => "worksite-state",
            FieldKind::CaseStatus => "case-status",
        };
        f.write_str(name)
    }
}

/// Possible errors to occur while resolving a header row
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("no header matches the {field} field (header row: {header:?})")]
    Unresolved { field: FieldKind, header: String },
    #[error("both {first:?} and {second:?} match the {field} field")]
    Ambiguous {
        field: FieldKind,
        first: String,
        second: String,
    },
}

/// Column positions of the required fields, resolved once from the header row
///
/// The yearly data dumps rename their columns, so fields are located by
/// header matching instead of fixed names:
/// * a header containing `soc_name` names the occupation,
/// * a header containing `state` together with `worksite` or `workloc1`
///   names the worksite state,
/// * a header containing `status` names the case status.
///
/// Matching is case-insensitive. Resolution fails up front if a field is
/// matched by no header, or by more than one, so that a schema problem never
/// surfaces rows-deep into ingestion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Schema {
    occupation: usize,
    worksite_state: usize,
    case_status: usize,
}

impl Schema {
    /// Resolves the three field positions from a header row
    pub fn resolve(header: &StringRecord) -> Result<Self, SchemaError> {
        let mut occupation = None;
        let mut worksite_state = None;
        let mut case_status = None;

        for (index, column) in header.iter().enumerate() {
            let column = column.to_ascii_lowercase();

            if column.contains("soc_name") {
                Self::claim(&mut occupation, FieldKind::Occupation, header, index)?;
            }
            if column.contains("state")
                && (column.contains("worksite") || column.contains("workloc1"))
            {
                Self::claim(&mut worksite_state, FieldKind::WorksiteState, header, index)?;
            }
            if column.contains("status") {
                Self::claim(&mut case_status, FieldKind::CaseStatus, header, index)?;
            }
        }

        Ok(Self {
            occupation: Self::require(occupation, FieldKind::Occupation, header)?,
            worksite_state: Self::require(worksite_state, FieldKind::WorksiteState, header)?,
            case_status: Self::require(case_status, FieldKind::CaseStatus, header)?,
        })
    }

    /// The occupation field of a data row, if the row has one
    pub fn occupation<'r>(&self, row: &'r StringRecord) -> Option<&'r str> {
        row.get(self.occupation)
    }

    /// The worksite-state field of a data row, if the row has one
    pub fn worksite_state<'r>(&self, row: &'r StringRecord) -> Option<&'r str> {
        row.get(self.worksite_state)
    }

    /// The case-status field of a data row, if the row has one
    pub fn case_status<'r>(&self, row: &'r StringRecord) -> Option<&'r str> {
        row.get(self.case_status)
    }

    fn claim(
        slot: &mut Option<usize>,
        field: FieldKind,
        header: &StringRecord,
        index: usize,
    ) -> Result<(), SchemaError> {
        match slot {
            None => {
                *slot = Some(index);
                Ok(())
            }
            Some(first) => Err(SchemaError::Ambiguous {
                field,
                first: header[*first].to_string(),
                second: header[index].to_string(),
            }),
        }
    }

    fn require(
        slot: Option<usize>,
        field: FieldKind,
        header: &StringRecord,
    ) -> Result<usize, SchemaError> {
        slot.ok_or_else(|| SchemaError::Unresolved {
            field,
            header: header.iter().collect::<Vec<_>>().join(";"),
        })
    }
}
