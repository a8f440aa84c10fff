//! # Scalar Coloring
//!
//! Maps a selected scalar array onto per-vertex RGB through a lookup table.
//!
//! Values are normalized against the array's `[min, max]` (or an explicit
//! range) and looked up in a table built by interpolating hue, saturation
//! and value linearly between the configured endpoints. A constant array has
//! no usable range; every sample then normalizes to `0.5`.
//!
//! Cell arrays are converted to vertex colors by averaging, at each surface
//! vertex, the values of the distinct source cells whose faces touch it.

use crate::error::{PipelineError, Result};
use crate::geometry::SurfaceGeometry;
use crate::mesh::{ArrayDomain, Mesh, ScalarArray};
use log::debug;
use serde::{Deserialize, Serialize};

/// Identifies the array to color by
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArraySelector {
    pub domain: ArrayDomain,
    pub name: String,
}

impl ArraySelector {
    pub fn point(name: impl Into<String>) -> Self {
        Self {
            domain: ArrayDomain::Point,
            name: name.into(),
        }
    }

    pub fn cell(name: impl Into<String>) -> Self {
        Self {
            domain: ArrayDomain::Cell,
            name: name.into(),
        }
    }
}

/// HSV lookup table description
///
/// Hue, saturation and value are interpolated linearly across `table_size`
/// entries. Lookups pick the entry a normalized value falls into and do not
/// blend neighbours, so mapped colors come in `table_size` discrete steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupTable {
    /// Hue at the minimum and at the maximum, in `[0, 1]`
    pub hue_range: (f64, f64),
    pub saturation_range: (f64, f64),
    pub value_range: (f64, f64),
    /// Number of discrete colors
    pub table_size: usize,
}

impl Default for LookupTable {
    fn default() -> Self {
        Self::rainbow()
    }
}

impl LookupTable {
    /// Blue at the minimum to red at the maximum
    pub fn rainbow() -> Self {
        Self {
            hue_range: (0.667, 0.0),
            saturation_range: (1.0, 1.0),
            value_range: (1.0, 1.0),
            table_size: 256,
        }
    }

    /// Black to white
    pub fn grayscale() -> Self {
        Self {
            hue_range: (0.0, 0.0),
            saturation_range: (0.0, 0.0),
            value_range: (0.0, 1.0),
            table_size: 256,
        }
    }

    /// Desaturated blue through to desaturated red
    pub fn cool_to_warm() -> Self {
        Self {
            hue_range: (0.6, 0.0),
            saturation_range: (0.75, 0.75),
            value_range: (0.9, 0.9),
            table_size: 256,
        }
    }

    /// Materializes the table
    pub fn build(&self) -> Vec<[f32; 3]> {
        let size = self.table_size.max(2);
        let lerp = |(a, b): (f64, f64), t: f64| a + (b - a) * t;
        (0..size)
            .map(|i| {
                let t = i as f64 / (size - 1) as f64;
                hsv_to_rgb(
                    lerp(self.hue_range, t),
                    lerp(self.saturation_range, t),
                    lerp(self.value_range, t),
                )
            })
            .collect()
    }

    /// Color at the minimum end
    pub fn cold(&self) -> [f32; 3] {
        self.map(0.0)
    }

    /// Color at the maximum end
    pub fn hot(&self) -> [f32; 3] {
        self.map(1.0)
    }

    /// Color of a normalized value; builds the table, prefer [`ColorMapper`] in loops
    pub fn map(&self, normalized: f64) -> [f32; 3] {
        let table = self.build();
        table[table_index(normalized, table.len())]
    }
}

fn table_index(normalized: f64, size: usize) -> usize {
    let scaled = (normalized.clamp(0.0, 1.0) * size as f64).floor() as usize;
    scaled.min(size - 1)
}

/// Converts HSV (all components in `[0, 1]`) to RGB
pub fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> [f32; 3] {
    let h = hue.rem_euclid(1.0) * 6.0;
    let s = saturation.clamp(0.0, 1.0);
    let v = value.clamp(0.0, 1.0);

    let sector = h.floor() as u32 % 6;
    let f = h - h.floor();
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    let (r, g, b) = match sector {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    [r as f32, g as f32, b as f32]
}

/// Normalizes `value` into `[0, 1]`; a degenerate range yields `0.5`
pub fn normalize(value: f64, min: f64, max: f64) -> f64 {
    if max <= min {
        return 0.5;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

/// A built table bound to a scalar range
pub struct ColorMapper {
    table: Vec<[f32; 3]>,
    range: Option<(f64, f64)>,
}

impl ColorMapper {
    pub fn new(lookup_table: &LookupTable, range: Option<(f64, f64)>) -> Self {
        Self {
            table: lookup_table.build(),
            range,
        }
    }

    pub fn color(&self, value: f64) -> [f32; 3] {
        let normalized = match self.range {
            Some((min, max)) if value.is_finite() => normalize(value, min, max),
            _ => 0.5,
        };
        self.table[table_index(normalized, self.table.len())]
    }
}

/// Coloring parameters for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorOptions {
    pub lookup_table: LookupTable,
    /// Overrides the array's own `[min, max]`
    pub scalar_range: Option<(f64, f64)>,
    /// Used when nothing is selected and for vertices without a value
    pub solid_color: [f32; 3],
}

impl Default for ColorOptions {
    fn default() -> Self {
        Self {
            lookup_table: LookupTable::default(),
            scalar_range: None,
            solid_color: [1.0, 0.5, 0.0],
        }
    }
}

/// Resolves a selector against the mesh, distinguishing "no arrays at all"
/// from "no array with that name"
pub fn resolve_array<'a>(mesh: &'a Mesh, selector: &ArraySelector) -> Result<&'a ScalarArray> {
    let arrays = mesh.arrays(selector.domain);
    if arrays.is_empty() {
        return Err(PipelineError::EmptyArray {
            domain: selector.domain.as_str(),
        });
    }
    arrays
        .iter()
        .find(|a| a.name == selector.name)
        .ok_or_else(|| PipelineError::UnknownArray {
            domain: selector.domain.as_str(),
            name: selector.name.clone(),
        })
}

/// Computes flat per-vertex RGB (`3 * vertex_count` floats) for `surface`
///
/// Without a selector every vertex gets the solid color.
pub fn colorize(
    mesh: &Mesh,
    surface: &SurfaceGeometry,
    selector: Option<&ArraySelector>,
    options: &ColorOptions,
) -> Result<Vec<f32>> {
    let Some(selector) = selector else {
        return Ok(solid(surface.vertex_count(), options.solid_color));
    };

    let array = resolve_array(mesh, selector)?;
    let range = options.scalar_range.or_else(|| array.range());
    if let Some((min, max)) = range {
        if max <= min {
            debug!("Array '{}' has a degenerate range [{}, {}]", array.name, min, max);
        }
    }
    let mapper = ColorMapper::new(&options.lookup_table, range);

    let values = match selector.domain {
        ArrayDomain::Point => point_values(surface, array),
        ArrayDomain::Cell => averaged_cell_values(surface, array),
    };

    let mut colors = Vec::with_capacity(surface.vertex_count() * 3);
    for value in values {
        let rgb = match value {
            Some(v) => mapper.color(v),
            None => options.solid_color,
        };
        colors.extend_from_slice(&rgb);
    }
    Ok(colors)
}

fn solid(vertex_count: usize, color: [f32; 3]) -> Vec<f32> {
    color.iter().copied().cycle().take(vertex_count * 3).collect()
}

fn point_values(surface: &SurfaceGeometry, array: &ScalarArray) -> Vec<Option<f64>> {
    surface
        .source_points
        .iter()
        .map(|&p| Some(array.scalar(p as usize)))
        .collect()
}

// Triangles of one cell are emitted contiguously by the extractor, so a
// vertex meets each owning cell in a single run and `last_cell` is enough
// to count every cell once.
fn averaged_cell_values(surface: &SurfaceGeometry, array: &ScalarArray) -> Vec<Option<f64>> {
    let n = surface.vertex_count();
    let mut sums = vec![0.0; n];
    let mut counts = vec![0u32; n];
    let mut last_cell = vec![u32::MAX; n];

    for (triangle, &cell) in surface.triangles().zip(&surface.source_cells) {
        let value = array.scalar(cell as usize);
        for vertex in triangle {
            let v = vertex as usize;
            if last_cell[v] != cell {
                last_cell[v] = cell;
                sums[v] += value;
                counts[v] += 1;
            }
        }
    }

    sums.into_iter()
        .zip(counts)
        .map(|(sum, count)| (count > 0).then(|| sum / count as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::extract_surface;
    use crate::mesh::{primitives, Cell, CellType};
    use crate::performance::Budget;

    fn cube_surface() -> (Mesh, SurfaceGeometry) {
        let mesh = primitives::unit_cube_tetra().unwrap();
        let surface = extract_surface(&mesh, &mut Budget::unlimited()).unwrap();
        (mesh, surface)
    }

    fn rgb(colors: &[f32], vertex: usize) -> [f32; 3] {
        [colors[vertex * 3], colors[vertex * 3 + 1], colors[vertex * 3 + 2]]
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), [1.0, 0.0, 0.0]);
        assert_eq!(hsv_to_rgb(0.5, 1.0, 1.0), [0.0, 1.0, 1.0]);
        assert_eq!(hsv_to_rgb(0.5, 0.0, 0.25), [0.25, 0.25, 0.25]);
    }

    #[test]
    fn test_rainbow_endpoints() {
        let lut = LookupTable::rainbow();
        let cold = lut.cold();
        let hot = lut.hot();
        assert_eq!(hot, [1.0, 0.0, 0.0]);
        assert!(cold[2] > 0.99 && cold[0] < 0.01);
    }

    #[test]
    fn test_lookup_is_quantized() {
        let lut = LookupTable {
            table_size: 4,
            ..LookupTable::grayscale()
        };
        let table = lut.build();
        assert_eq!(table.len(), 4);
        // evenly spaced values along the ramp
        for pair in table.windows(2) {
            assert!((pair[1][0] - pair[0][0] - 1.0 / 3.0).abs() < 1e-6);
        }
        // every value inside a bucket snaps to that bucket's entry
        assert_eq!(lut.map(0.0), table[0]);
        assert_eq!(lut.map(0.24), table[0]);
        assert_eq!(lut.map(0.26), table[1]);
        assert_eq!(lut.map(0.99), table[3]);
    }

    #[test]
    fn test_min_max_map_to_endpoints() {
        let (mesh, surface) = cube_surface();
        let options = ColorOptions {
            scalar_range: Some((20.0, 90.0)),
            ..Default::default()
        };
        let colors = colorize(&mesh, &surface, Some(&ArraySelector::point("Temperature")), &options)
            .unwrap();
        assert_eq!(colors.len(), surface.vertex_count() * 3);

        let lut = &options.lookup_table;
        for (v, &p) in surface.source_points.iter().enumerate() {
            match p {
                0 => assert_eq!(rgb(&colors, v), lut.cold()),
                6 => assert_eq!(rgb(&colors, v), lut.hot()),
                _ => {}
            }
        }
    }

    #[test]
    fn test_constant_array_is_uniform() {
        let mesh = primitives::unit_cube_tetra()
            .unwrap()
            .with_point_array(ScalarArray::scalars("flat", vec![42.0; 8]))
            .unwrap();
        let surface = extract_surface(&mesh, &mut Budget::unlimited()).unwrap();
        let colors = colorize(
            &mesh,
            &surface,
            Some(&ArraySelector::point("flat")),
            &ColorOptions::default(),
        )
        .unwrap();
        let first = rgb(&colors, 0);
        for v in 0..surface.vertex_count() {
            assert_eq!(rgb(&colors, v), first);
        }
        assert_eq!(first, LookupTable::default().map(0.5));
    }

    #[test]
    fn test_cell_values_are_averaged() {
        let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
        let cells = vec![
            Cell::new(CellType::Triangle, vec![0, 1, 2]),
            Cell::new(CellType::Triangle, vec![0, 2, 3]),
        ];
        let mesh = Mesh::new(points, cells)
            .unwrap()
            .with_cell_array(ScalarArray::scalars("c", vec![0.0, 10.0]))
            .unwrap();
        let surface = extract_surface(&mesh, &mut Budget::unlimited()).unwrap();
        let values = averaged_cell_values(&surface, mesh.array(ArrayDomain::Cell, "c").unwrap());
        // vertices 0 and 2 are shared by both cells
        assert_eq!(values, vec![Some(5.0), Some(0.0), Some(5.0), Some(10.0)]);
    }

    #[test]
    fn test_missing_arrays() {
        let (mesh, surface) = cube_surface();
        let options = ColorOptions::default();

        let err = colorize(&mesh, &surface, Some(&ArraySelector::point("nope")), &options)
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownArray { .. }));

        let bare = Mesh::new(mesh.points().to_vec(), mesh.cells().to_vec()).unwrap();
        let err = colorize(&bare, &surface, Some(&ArraySelector::cell("Pressure")), &options)
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyArray { domain: "cell" }));
    }

    #[test]
    fn test_no_selector_is_solid() {
        let (mesh, surface) = cube_surface();
        let colors = colorize(&mesh, &surface, None, &ColorOptions::default()).unwrap();
        assert_eq!(rgb(&colors, 3), [1.0, 0.5, 0.0]);
    }
}
