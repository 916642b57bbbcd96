use std::io::{self, Write};

use crate::{CategoryStat, Dimension};

/// Reports list at most this many categories
pub const TOP_N: usize = 10;

/// Possible errors to occur while writing a report
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// With no certified applications the percentage column is undefined,
    /// so the whole report is refused rather than emitted empty.
    #[error("the input contains no certified applications")]
    NoCertifiedApplications,
    #[error("failed to write report")]
    Io(#[from] io::Error),
}

/// Formats `certified` as a share of `total_certified`, in percent with
/// exactly one decimal digit
///
/// Rounds half away from zero. The arithmetic is integer-only: binary
/// floating point cannot represent values like 1.05 exactly, and rounding
/// through it would misround shares that land on a `.x5` boundary.
pub fn percentage(certified: u64, total_certified: u64) -> String {
    debug_assert!(total_certified > 0);
    let scaled = certified * 1000;
    let mut tenths = scaled / total_certified;
    if (scaled % total_certified) * 2 >= total_certified {
        tenths += 1;
    }
    format!("{}.{}", tenths / 10, tenths % 10)
}

/// Writes one dimension's report: a header line, then up to [`TOP_N`]
/// categories in rank order as `<name>;<certified>;<percentage>%`
pub fn write_report<W: Write>(
    mut out: W,
    dimension: Dimension,
    ranked: &[&CategoryStat],
    total_certified: u64,
) -> Result<(), ReportError> {
    if total_certified == 0 {
        return Err(ReportError::NoCertifiedApplications);
    }

    writeln!(
        out,
        "{};NUMBER_CERTIFIED_APPLICATIONS;PERCENTAGE",
        dimension.label()
    )?;
    for stat in ranked.iter().take(TOP_N) {
        writeln!(
            out,
            "{};{};{}%",
            stat.name(),
            stat.certified(),
            percentage(stat.certified(), total_certified),
        )?;
    }

    Ok(())
}
