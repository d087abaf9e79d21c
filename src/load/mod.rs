//! Reading 2D grids from text files.
//!
//! Two formats are understood. Tecplot style `.plt` files look like
//!
//! ```text
//! VARIABLES = "X", "Y", "Vx/U"
//! ZONE I=3, J=2
//! 0.0  0.0  1.5
//! ...
//! ```
//!
//! with `I * J` data rows, `J` varying fastest. Anything else is read as
//! plain delimited text with one grid row (y) per line.

use crate::grid::Grid;
use crate::{Float, Input};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Column read from a `.plt` file when none is configured.
pub const DEFAULT_VARIABLE: &str = "Vx/U";

pub fn load_grid(input: &Input) -> Result<Grid> {
    let contents = fs::read_to_string(&input.path)
        .with_context(|| format!("Could not open input file {}", input.path))?;
    let is_plt = Path::new(&input.path)
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("plt"));
    if is_plt {
        let variable = input.variable.as_deref().unwrap_or(DEFAULT_VARIABLE);
        parse_plt(&contents, variable).with_context(|| format!("Could not parse {}", input.path))
    } else {
        parse_delimited(&contents, input.delimiter.as_deref())
            .with_context(|| format!("Could not parse {}", input.path))
    }
}

fn header_tokens(line: &str) -> Vec<String> {
    line.replace(|c: char| c == ',' || c == '"' || c == '=', " ")
        .split_whitespace()
        .map(|s| s.to_string())
        .collect()
}

fn zone_extent(tokens: &[String], key: &str) -> Result<usize> {
    let at = tokens
        .iter()
        .position(|t| t.eq_ignore_ascii_case(key))
        .with_context(|| format!("ZONE line has no {} extent", key))?;
    let value = tokens
        .get(at + 1)
        .with_context(|| format!("ZONE line has no value for {}", key))?;
    value
        .parse::<usize>()
        .with_context(|| format!("Bad {} extent {:?}", key, value))
}

/// Reads column `variable` of a `.plt` file into an `I x J` grid.
pub fn parse_plt(contents: &str, variable: &str) -> Result<Grid> {
    let mut lines = contents.lines().filter(|l| !l.trim().is_empty());

    let header = lines.next().context("plt file is empty")?;
    let names: Vec<String> = header_tokens(header).into_iter().skip(1).collect();
    let column = names
        .iter()
        .position(|n| n == variable)
        .with_context(|| format!("Variable {} not found in {:?}", variable, names))?;

    let zone = header_tokens(lines.next().context("plt file has no ZONE line")?);
    let size_i = zone_extent(&zone, "I")?;
    let size_j = zone_extent(&zone, "J")?;

    let mut data: Vec<Float> = vec![0.0; size_i * size_j];
    for row in 0..size_i * size_j {
        let line = lines
            .next()
            .with_context(|| format!("Expected {} data rows, found {}", size_i * size_j, row))?;
        let field = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .nth(column)
            .with_context(|| format!("Data row {} has no column {}", row, column))?;
        let value: Float = field
            .parse()
            .with_context(|| format!("Bad value {:?} in data row {}", field, row))?;
        let (i, j) = (row / size_j, row % size_j);
        data[i + size_i * j] = value;
    }

    Ok(Grid::new(&[size_i, size_j], data)?)
}

/// One grid row per non-empty line. Fields split on `delimiter`, or on
/// whitespace if none is given.
pub fn parse_delimited(contents: &str, delimiter: Option<&str>) -> Result<Grid> {
    let mut rows: Vec<Vec<Float>> = Vec::new();
    for (n, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = match delimiter {
            Some(d) => line.split(d).map(str::trim).collect(),
            None => line.split_whitespace().collect(),
        };
        let row = fields
            .iter()
            .map(|f| {
                f.parse::<Float>()
                    .with_context(|| format!("Bad value {:?} on line {}", f, n + 1))
            })
            .collect::<Result<Vec<Float>>>()?;
        rows.push(row);
    }
    if rows.is_empty() {
        return Err(anyhow::Error::msg("input holds no data rows"));
    }
    Ok(Grid::from_rows(&rows)?)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::grid::Pos;

    const PLT: &str = "VARIABLES = \"X\", \"Y\", \"Vx/U\"\n\
                       ZONE I=3, J=2\n\
                       0.0\t0.0\t1.0\n\
                       0.0\t1.0\t2.0\n\
                       1.0\t0.0\t3.0\n\
                       1.0\t1.0\t4.0\n\
                       2.0\t0.0\t5.0\n\
                       2.0\t1.0\t6.0\n";

    #[test]
    fn plt_column_and_order() {
        let grid = parse_plt(PLT, "Vx/U").unwrap();
        assert_eq!(grid.dim().extents(), &[3, 2]);
        assert_eq!(grid.get(&Pos::from((0, 0))), 1.0);
        assert_eq!(grid.get(&Pos::from((0, 1))), 2.0);
        assert_eq!(grid.get(&Pos::from((2, 1))), 6.0);

        let xs = parse_plt(PLT, "X").unwrap();
        assert_eq!(xs.get(&Pos::from((2, 0))), 2.0);
    }

    #[test]
    fn plt_errors() {
        assert!(parse_plt(PLT, "Vy/U").is_err());
        assert!(parse_plt("", "X").is_err());
        let truncated: String = PLT.lines().take(5).collect::<Vec<_>>().join("\n");
        assert!(parse_plt(&truncated, "Vx/U").is_err());
    }

    #[test]
    fn delimited_rows() {
        let grid = parse_delimited("1 2 3\n4 5 6\n\n", None).unwrap();
        assert_eq!(grid.dim().extents(), &[3, 2]);
        assert_eq!(grid.get(&Pos::from((0, 1))), 4.0);

        let csv = parse_delimited("1.5, 2\n3, 4\n", Some(",")).unwrap();
        assert_eq!(csv.as_slice(), &[1.5, 2.0, 3.0, 4.0]);

        assert!(parse_delimited("1 2\n3\n", None).is_err());
        assert!(parse_delimited("1 x\n", None).is_err());
        assert!(parse_delimited("\n\n", None).is_err());
    }

    #[test]
    fn load_picks_format_by_extension() {
        let dir = std::env::temp_dir().join(format!("field_smooth_load_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let plt = dir.join("field.plt");
        fs::write(&plt, PLT).unwrap();
        let txt = dir.join("field.txt");
        fs::write(&txt, "0 1\n2 3\n").unwrap();

        let from_plt = load_grid(&Input {
            path: plt.to_string_lossy().into_owned(),
            variable: None,
            delimiter: None,
        })
        .unwrap();
        assert_eq!(from_plt.dim().extents(), &[3, 2]);

        let from_txt = load_grid(&Input {
            path: txt.to_string_lossy().into_owned(),
            variable: None,
            delimiter: None,
        })
        .unwrap();
        assert_eq!(from_txt.as_slice(), &[0.0, 1.0, 2.0, 3.0]);

        fs::remove_dir_all(&dir).unwrap();
    }
}
