//! Plain-text model format.
//!
//! # Layout
//! ```text
//! #num_vertices #num_cells #num_anchors #index_inputvertex #num_inputpoints #index_outputvertex #num_outputpoints
//! 9 4 1 2 3 8 3
//!
//! #vertices
//! 0 0
//! ...
//! #anchors
//! 0
//! #cells [type s=shear r=rigid]
//! s 0 1 2 3
//! #input path
//! 2 0
//! ...
//! #output path
//! 2 2
//! ```
//!
//! Vertex indices are positions in the `#vertices` list. A missing input or
//! output vertex is written as index `-1` with zero points. Cell corners are
//! listed counter-clockwise from the index vertex. Blank lines are ignored;
//! unknown `#` sections are skipped.
//!
//! # Limitations
//! - Vertex coordinates must be integral.
//! - The writer stores the undeformed state; the current deformation is lost.

use crate::geometry::vector::Vec2;
use crate::io::{MechanismReader, MechanismWriter};
use crate::mech_error::MechError;
use crate::mechanism::{Mechanism, TrackedPath};
use crate::topology::cell_type::CellKind;
use crate::topology::grid::Grid;
use crate::topology::point::GridPoint;
use std::io::{Read, Write};

const COUNTS_HEADER: &str = "#num_vertices #num_cells #num_anchors #index_inputvertex #num_inputpoints #index_outputvertex #num_outputpoints";

/// Reader and writer for the text model format.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModelText;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Section {
    Counts,
    Vertices,
    Anchors,
    Cells,
    InputPath,
    OutputPath,
    Skipped,
}

impl Section {
    fn from_header(line: &str) -> Section {
        let name = line.trim_start_matches('#');
        if name.starts_with("num_vertices") {
            Section::Counts
        } else if name.starts_with("vertices") {
            Section::Vertices
        } else if name.starts_with("anchors") {
            Section::Anchors
        } else if name.starts_with("cells") {
            Section::Cells
        } else if name.starts_with("input path") {
            Section::InputPath
        } else if name.starts_with("output path") {
            Section::OutputPath
        } else {
            Section::Skipped
        }
    }
}

#[derive(Debug, Default)]
struct Counts {
    vertices: usize,
    cells: usize,
    anchors: usize,
    input: Option<usize>,
    input_points: usize,
    output: Option<usize>,
    output_points: usize,
}

impl ModelText {
    fn parse_usize(raw: &str, what: &str) -> Result<usize, MechError> {
        raw.parse::<usize>()
            .map_err(|_| MechError::ModelParse(format!("invalid {what}: {raw}")))
    }

    fn parse_index(raw: &str, what: &str) -> Result<Option<usize>, MechError> {
        match raw.parse::<i64>() {
            Ok(-1) => Ok(None),
            Ok(i) if i >= 0 => Ok(Some(i as usize)),
            _ => Err(MechError::ModelParse(format!("invalid {what}: {raw}"))),
        }
    }

    fn parse_coord(raw: Option<&str>) -> Result<f64, MechError> {
        let raw = raw.ok_or_else(|| MechError::ModelParse("missing coordinate".into()))?;
        raw.parse::<f64>()
            .map_err(|_| MechError::ModelParse(format!("invalid coordinate: {raw}")))
    }

    fn parse_point(line: &str) -> Result<Vec2, MechError> {
        let mut parts = line.split_whitespace();
        Ok([
            Self::parse_coord(parts.next())?,
            Self::parse_coord(parts.next())?,
        ])
    }

    fn parse_counts(line: &str) -> Result<Counts, MechError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 7 {
            return Err(MechError::ModelParse(format!(
                "counts line needs 7 fields, found {}",
                parts.len()
            )));
        }
        Ok(Counts {
            vertices: Self::parse_usize(parts[0], "vertex count")?,
            cells: Self::parse_usize(parts[1], "cell count")?,
            anchors: Self::parse_usize(parts[2], "anchor count")?,
            input: Self::parse_index(parts[3], "input vertex index")?,
            input_points: Self::parse_usize(parts[4], "input point count")?,
            output: Self::parse_index(parts[5], "output vertex index")?,
            output_points: Self::parse_usize(parts[6], "output point count")?,
        })
    }

    fn vertex(vertices: &[GridPoint], raw: &str) -> Result<GridPoint, MechError> {
        let i = Self::parse_usize(raw, "vertex index")?;
        vertices
            .get(i)
            .copied()
            .ok_or_else(|| MechError::ModelParse(format!("vertex index {i} out of range")))
    }

    fn check_count(what: &str, expected: usize, found: usize) -> Result<(), MechError> {
        if expected == found {
            Ok(())
        } else {
            Err(MechError::ModelParse(format!(
                "{what}: header says {expected}, found {found}"
            )))
        }
    }
}

impl MechanismReader for ModelText {
    fn read<R: Read>(&self, mut reader: R) -> Result<Mechanism, MechError> {
        let mut contents = String::new();
        reader.read_to_string(&mut contents)?;

        let mut section = Section::Skipped;
        let mut counts: Option<Counts> = None;
        let mut vertices: Vec<GridPoint> = Vec::new();
        let mut anchors: Vec<GridPoint> = Vec::new();
        let mut cells: Vec<(CellKind, [GridPoint; 4])> = Vec::new();
        let mut input_path: Vec<Vec2> = Vec::new();
        let mut output_path: Vec<Vec2> = Vec::new();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('#') {
                section = Section::from_header(line);
                continue;
            }
            match section {
                Section::Counts => {
                    if counts.is_some() {
                        return Err(MechError::ModelParse("duplicate counts line".into()));
                    }
                    counts = Some(Self::parse_counts(line)?);
                }
                Section::Vertices => {
                    let [x, y] = Self::parse_point(line)?;
                    if x.fract() != 0.0 || y.fract() != 0.0 {
                        return Err(MechError::ModelParse(format!(
                            "vertex coordinates must be integral: {line}"
                        )));
                    }
                    vertices.push(GridPoint::new(x as i32, y as i32));
                }
                Section::Anchors => anchors.push(Self::vertex(&vertices, line)?),
                Section::Cells => {
                    let mut parts = line.split_whitespace();
                    let tag = parts.next().and_then(|t| t.chars().next());
                    let kind = tag.and_then(CellKind::from_tag).ok_or_else(|| {
                        MechError::ModelParse(format!("unknown cell type in: {line}"))
                    })?;
                    let mut corners = [GridPoint::default(); 4];
                    for c in &mut corners {
                        let raw = parts.next().ok_or_else(|| {
                            MechError::ModelParse(format!("cell needs 4 vertices: {line}"))
                        })?;
                        *c = Self::vertex(&vertices, raw)?;
                    }
                    cells.push((kind, corners));
                }
                Section::InputPath => input_path.push(Self::parse_point(line)?),
                Section::OutputPath => output_path.push(Self::parse_point(line)?),
                Section::Skipped => {}
            }
        }

        let counts = counts.ok_or_else(|| MechError::ModelParse("missing counts line".into()))?;
        Self::check_count("vertices", counts.vertices, vertices.len())?;
        Self::check_count("cells", counts.cells, cells.len())?;
        Self::check_count("anchors", counts.anchors, anchors.len())?;
        Self::check_count("input points", counts.input_points, input_path.len())?;
        Self::check_count("output points", counts.output_points, output_path.len())?;

        let mut grid = Grid::new();
        for (kind, corners) in cells {
            grid.add_cell_from_vertices(kind, corners)?;
        }
        for a in anchors {
            grid.set_anchor(a, true);
        }
        let track = |index: Option<usize>, points: Vec<Vec2>| -> Result<Option<TrackedPath>, MechError> {
            let Some(i) = index else {
                return Ok(None);
            };
            let vertex = vertices
                .get(i)
                .copied()
                .ok_or_else(|| MechError::ModelParse(format!("tracked vertex {i} out of range")))?;
            grid.vertex_at(vertex).ok_or(MechError::UnknownVertex(vertex))?;
            Ok(Some(TrackedPath::new(vertex, points)))
        };
        let input = track(counts.input, input_path)?;
        let output = track(counts.output, output_path)?;

        let mut mech = Mechanism::new(grid);
        mech.set_targets(input, output);
        log::debug!(
            "read model: {} vertices, {} cells, {} anchors",
            mech.grid.vertex_count(),
            mech.grid.cell_count(),
            mech.grid.anchors().len()
        );
        Ok(mech)
    }
}

impl MechanismWriter for ModelText {
    fn write<W: Write>(&self, mut writer: W, mech: &Mechanism) -> Result<(), MechError> {
        let grid = &mech.grid;
        let numbering = grid.vertex_numbering();
        let index_of = |t: Option<&TrackedPath>| -> i64 {
            t.and_then(|t| grid.vertex_at(t.vertex))
                .and_then(|v| numbering.get(&v).copied())
                .map_or(-1, |i| i as i64)
        };
        let (input, output) = (index_of(mech.input()), index_of(mech.output()));
        let input_points = mech.input().map_or(&[][..], |t| t.points.as_slice());
        let output_points = mech.output().map_or(&[][..], |t| t.points.as_slice());
        let anchors: Vec<usize> = grid
            .vertices()
            .filter(|(_, v)| v.is_anchor())
            .map(|(id, _)| numbering[&id])
            .collect();

        writeln!(writer, "{COUNTS_HEADER}")?;
        writeln!(
            writer,
            "{} {} {} {} {} {} {}",
            grid.vertex_count(),
            grid.cell_count(),
            anchors.len(),
            input,
            input_points.len(),
            output,
            output_points.len()
        )?;
        writeln!(writer)?;

        writeln!(writer, "#vertices")?;
        for (_, v) in grid.vertices() {
            let p = v.point();
            writeln!(writer, "{} {}", p.x, p.y)?;
        }
        writeln!(writer)?;

        writeln!(writer, "#anchors")?;
        for a in anchors {
            writeln!(writer, "{a}")?;
        }
        writeln!(writer)?;

        writeln!(writer, "#cells [type s=shear r=rigid]")?;
        for (_, cell) in grid.cells() {
            let [a, b, c, d] = cell.vertices().map(|v| numbering[&v]);
            writeln!(writer, "{} {a} {b} {c} {d}", cell.kind().tag())?;
        }
        writeln!(writer)?;

        writeln!(writer, "#input path")?;
        for p in input_points {
            writeln!(writer, "{} {}", p[0], p[1])?;
        }
        writeln!(writer)?;

        writeln!(writer, "#output path")?;
        for p in output_points {
            writeln!(writer, "{} {}", p[0], p[1])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_CELLS: &str = "\
#num_vertices #num_cells #num_anchors #index_inputvertex #num_inputpoints #index_outputvertex #num_outputpoints
6 2 2 5 2 -1 0

#vertices
0 0
1 0
1 1
0 1
2 0
2 1

#anchors
0
1

#cells [type s=shear r=rigid]
r 0 1 2 3
s 1 4 5 2

#input path
2 1
2.5 1.25

#output path
";

    #[test]
    fn reads_cells_anchors_and_paths() {
        let m = ModelText.read(TWO_CELLS.as_bytes()).unwrap();
        assert_eq!(m.grid.cell_count(), 2);
        assert_eq!(m.grid.vertex_count(), 6);
        let c = m.grid.cell_at(GridPoint::new(1, 0)).unwrap();
        assert_eq!(m.grid[c].kind(), CellKind::Shear);
        let mut anchors = m.grid.anchors();
        anchors.sort();
        assert_eq!(anchors, vec![GridPoint::new(0, 0), GridPoint::new(1, 0)]);
        let input = m.input().unwrap();
        assert_eq!(input.vertex, GridPoint::new(2, 1));
        assert_eq!(input.points, vec![[2.0, 1.0], [2.5, 1.25]]);
        assert!(m.output().is_none());
    }

    #[test]
    fn written_text_reads_back() {
        let m = ModelText.read(TWO_CELLS.as_bytes()).unwrap();
        let mut buf = Vec::new();
        ModelText.write(&mut buf, &m).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with(COUNTS_HEADER));
        assert!(text.contains("\nr 0 1 2 3\n"));
        let back = ModelText.read(text.as_bytes()).unwrap();
        assert_eq!(back.grid.layout(), m.grid.layout());
        assert_eq!(back.input(), m.input());
    }

    #[test]
    fn count_mismatch_is_reported() {
        let text = TWO_CELLS.replacen("6 2 2", "7 2 2", 1);
        let err = ModelText.read(text.as_bytes()).unwrap_err();
        assert_eq!(
            err,
            MechError::ModelParse("vertices: header says 7, found 6".into())
        );
    }

    #[test]
    fn bad_cell_tag_and_index() {
        let text = TWO_CELLS.replacen("s 1 4 5 2", "x 1 4 5 2", 1);
        assert!(matches!(
            ModelText.read(text.as_bytes()),
            Err(MechError::ModelParse(_))
        ));
        let text = TWO_CELLS.replacen("s 1 4 5 2", "s 1 4 9 2", 1);
        assert_eq!(
            ModelText.read(text.as_bytes()).unwrap_err(),
            MechError::ModelParse("vertex index 9 out of range".into())
        );
    }

    #[test]
    fn skips_unknown_sections() {
        let text = format!("{TWO_CELLS}\n#tracing points\n1 1\n");
        assert!(ModelText.read(text.as_bytes()).is_ok());
    }
}
