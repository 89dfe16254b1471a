//! ASCII-grid DEM parser.
//!
//! The format is the ESRI six-line header (`ncols`, `nrows`, `xllcorner`,
//! `yllcorner`, `cellsize`, optional `NODATA_value`) followed by `nrows`
//! rows of z values, top row first. Rows are flipped so index 0 is minimum
//! y, then transposed so the first index is x, matching the DTM layout.

use crate::error::{Result, StrataError};
use crate::model::topography::ImplicitDtm;

fn header_value<'a>(line: Option<&'a str>, key: &str) -> Result<f64> {
    let line = line.ok_or_else(|| StrataError::input(format!("DEM header truncated before {key}")))?;
    let mut parts = line.split_whitespace();
    let name = parts
        .next()
        .ok_or_else(|| StrataError::input(format!("empty DEM header line, expected {key}")))?;
    if !name.eq_ignore_ascii_case(key) {
        return Err(StrataError::input(format!("DEM header mismatch: expected {key}, got {name}")));
    }
    parts
        .next()
        .and_then(|v| v.parse::<f64>().ok())
        .ok_or_else(|| StrataError::input(format!("unparsable DEM header value for {key}")))
}

/// Parse ASCII-grid text into an implicit DTM.
pub fn parse_ascii_grid(dem: &str) -> Result<ImplicitDtm> {
    let mut lines = dem.lines();
    let ncols = header_value(lines.next(), "ncols")? as usize;
    let nrows = header_value(lines.next(), "nrows")? as usize;
    let xllcorner = header_value(lines.next(), "xllcorner")?;
    let yllcorner = header_value(lines.next(), "yllcorner")?;
    let cellsize = header_value(lines.next(), "cellsize")?;
    if ncols == 0 || nrows == 0 {
        return Err(StrataError::input("DEM grid is empty"));
    }

    let mut rows: Vec<Vec<f64>> = Vec::with_capacity(nrows);
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        // The NODATA_value line is optional and may follow cellsize.
        if rows.is_empty() && trimmed.to_ascii_lowercase().starts_with("nodata_value") {
            continue;
        }
        let row: Vec<f64> = trimmed
            .split_whitespace()
            .map(|v| {
                v.parse::<f64>()
                    .map_err(|_| StrataError::input(format!("unparsable DEM value {v:?}")))
            })
            .collect::<Result<_>>()?;
        if row.len() != ncols {
            return Err(StrataError::input(format!(
                "DEM row has {} values, header says ncols {}",
                row.len(),
                ncols
            )));
        }
        rows.push(row);
    }
    if rows.len() != nrows {
        return Err(StrataError::input(format!(
            "DEM has {} rows, header says nrows {}",
            rows.len(),
            nrows
        )));
    }

    // Flip so row 0 is minimum y, transpose so the first index is x.
    let mut z = vec![0.0; ncols * nrows];
    for (r, row) in rows.iter().enumerate() {
        let iy = nrows - 1 - r;
        for (ix, &value) in row.iter().enumerate() {
            z[ix * nrows + iy] = value;
        }
    }

    Ok(ImplicitDtm {
        origin: (xllcorner, yllcorner),
        cellsize: (cellsize, cellsize),
        nx: ncols,
        ny: nrows,
        z,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DEM: &str = "ncols 3\n\
                       nrows 2\n\
                       xllcorner 100.0\n\
                       yllcorner 200.0\n\
                       cellsize 10.0\n\
                       NODATA_value -9999\n\
                       1 2 3\n\
                       4 5 6\n";

    #[test]
    fn rows_are_flipped_and_transposed() {
        let dtm = parse_ascii_grid(DEM).unwrap();
        assert_eq!((dtm.nx, dtm.ny), (3, 2));
        // Top input row (1 2 3) is maximum y.
        assert_relative_eq!(dtm.evaluate_z(100.0, 210.0), 1.0);
        assert_relative_eq!(dtm.evaluate_z(120.0, 210.0), 3.0);
        // Bottom input row (4 5 6) is minimum y.
        assert_relative_eq!(dtm.evaluate_z(100.0, 200.0), 4.0);
        assert_relative_eq!(dtm.evaluate_z(120.0, 200.0), 6.0);
    }

    #[test]
    fn nodata_line_is_optional() {
        let without = "ncols 2\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2\n3 4\n";
        let dtm = parse_ascii_grid(without).unwrap();
        assert_relative_eq!(dtm.evaluate_z(0.0, 0.0), 3.0);
    }

    #[test]
    fn header_mismatch_is_fatal() {
        let bad = "ncols 2\nxllcorner 0\n";
        assert!(parse_ascii_grid(bad).is_err());
    }

    #[test]
    fn short_grid_is_fatal() {
        let bad = "ncols 2\nnrows 3\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2\n3 4\n";
        assert!(parse_ascii_grid(bad).is_err());
    }
}
