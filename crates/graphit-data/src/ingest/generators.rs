//! Built-in sample datasets
//!
//! Generators are regenerated on every update run and never touch the
//! filesystem.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use graphit_core::{ColumnData, ColumnValues, Shape, Table};

use crate::{DataError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorId {
    Game,
    TriSurface,
    Waveform,
    Peaks,
    Sphere,
}

impl GeneratorId {
    /// Generation order used by update runs
    pub const ALL: [GeneratorId; 5] = [
        GeneratorId::Game,
        GeneratorId::TriSurface,
        GeneratorId::Waveform,
        GeneratorId::Peaks,
        GeneratorId::Sphere,
    ];

    /// Artifact name; the prefix classifies the dataset
    pub fn name(&self) -> &'static str {
        match self {
            GeneratorId::Game => "game_data",
            GeneratorId::TriSurface => "iso_tri_surface",
            GeneratorId::Waveform => "iso_waveform",
            GeneratorId::Peaks => "iso_peaks",
            GeneratorId::Sphere => "iso_sphere",
        }
    }

    pub fn generate(&self) -> Result<Table> {
        match self {
            GeneratorId::Game => game_data(),
            GeneratorId::TriSurface => tri_surface(),
            GeneratorId::Waveform => waveform(),
            GeneratorId::Peaks => peaks(),
            GeneratorId::Sphere => sphere(),
        }
    }
}

impl fmt::Display for GeneratorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GeneratorId {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.name() == s)
            .ok_or_else(|| DataError::NotFound(s.to_string()))
    }
}

const X: &str = "x_coordinate";
const Y: &str = "y_coordinate";
const Z: &str = "z_coordinate";

fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    let n = ((stop - start) / step).ceil().max(0.0) as usize;
    (0..n).map(|i| start + step * i as f64).collect()
}

/// Row-major grid of `f(row_value, col_value)`
fn grid(rows: &[f64], cols: &[f64], f: impl Fn(f64, f64) -> f64) -> Vec<Option<f64>> {
    let f = &f;
    rows.iter()
        .flat_map(|&r| cols.iter().map(move |&c| Some(f(r, c))))
        .collect()
}

fn shaped_xyz(
    shape: Shape,
    x: Vec<Option<f64>>,
    y: Vec<Option<f64>>,
    z: Vec<Option<f64>>,
) -> Result<Table> {
    let columns = [(X, x), (Y, y), (Z, z)]
        .into_iter()
        .map(|(name, values)| {
            ColumnData::shaped(name, ColumnValues::Float(values), shape.clone())
                .map(|data| (name, data))
        })
        .collect::<graphit_core::Result<Vec<_>>>()?;
    Ok(Table::shaped(columns)?)
}

fn game_data() -> Result<Table> {
    const LEVELS: i64 = 100;
    let capacity = (LEVELS * LEVELS) as usize;
    let mut player_level = Vec::with_capacity(capacity);
    let mut enemy_level = Vec::with_capacity(capacity);
    let mut player_hp = Vec::with_capacity(capacity);
    let mut enemy_hp = Vec::with_capacity(capacity);
    let mut diff = Vec::with_capacity(capacity);

    for player in 1..=LEVELS {
        for enemy in 1..=LEVELS {
            let hard_diff = (player - enemy).max(1);
            player_level.push(Some(player));
            enemy_level.push(Some(enemy));
            player_hp.push(Some(player * 1000));
            let hp = 1000.0 * ((hard_diff + 1) as f64).ln() * enemy as f64;
            enemy_hp.push(Some(hp.ceil() as i64));
            diff.push(Some(hard_diff));
        }
    }

    Ok(Table::flat(vec![
        ("player_level", ColumnValues::Integer(player_level)),
        ("enemy_level", ColumnValues::Integer(enemy_level)),
        ("player_hp", ColumnValues::Integer(player_hp)),
        ("enemy_hp", ColumnValues::Integer(enemy_hp)),
        ("diff", ColumnValues::Integer(diff)),
    ])?)
}

/// Concentric rings of points around the origin
fn tri_surface() -> Result<Table> {
    let radii = linspace(0.125, 1.0, 8);
    let angles: Vec<f64> = (0..36).map(|i| 2.0 * PI * i as f64 / 36.0).collect();

    let mut x = vec![0.0];
    let mut y = vec![0.0];
    for angle in &angles {
        for radius in &radii {
            x.push(radius * angle.cos());
            y.push(radius * angle.sin());
        }
    }
    let z: Vec<f64> = x.iter().zip(&y).map(|(x, y)| (-x * y).sin()).collect();

    let wrap = |v: Vec<f64>| ColumnValues::Float(v.into_iter().map(Some).collect());
    Ok(Table::flat(vec![(X, wrap(x)), (Y, wrap(y)), (Z, wrap(z))])?)
}

/// Difference of two gaussian bumps, the classic 3-D test surface
fn waveform() -> Result<Table> {
    let axis = arange(-3.0, 3.0, 0.03);
    let n = axis.len();

    let gaussian = |x: f64, y: f64| {
        let z1 = (-(x * x + y * y) / 2.0).exp() / (2.0 * PI);
        let z2 = (-(((x - 1.0) / 1.5).powi(2) + ((y - 1.0) / 0.5).powi(2)) / 2.0).exp()
            / (2.0 * PI * 0.5 * 1.5);
        z2 - z1
    };

    let x = grid(&axis, &axis, |_, c| c * 10.0);
    let y = grid(&axis, &axis, |r, _| r * 10.0);
    let z = grid(&axis, &axis, |r, c| gaussian(c, r) * 500.0);
    shaped_xyz(Shape::new(vec![n, n]), x, y, z)
}

fn peaks() -> Result<Table> {
    let cols = linspace(-6.0, 6.0, 50);
    let rows = linspace(-6.0, 6.0, 30);

    let x = grid(&rows, &cols, |_, c| c);
    let y = grid(&rows, &cols, |r, _| r);
    let z = grid(&rows, &cols, |r, c| (c * c + r * r).sqrt().sin());
    shaped_xyz(Shape::new(vec![rows.len(), cols.len()]), x, y, z)
}

/// Spheroid of radius 10 flattened to 9 along z
fn sphere() -> Result<Table> {
    let u = linspace(0.0, 2.0 * PI, 100);
    let v = linspace(0.0, PI, 100);

    let x = grid(&u, &v, |u, v| 10.0 * u.cos() * v.sin());
    let y = grid(&u, &v, |u, v| 10.0 * u.sin() * v.sin());
    let z = grid(&u, &v, |_, v| 9.0 * v.cos());
    shaped_xyz(Shape::new(vec![u.len(), v.len()]), x, y, z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphit_core::TableKind;

    #[test]
    fn test_generator_names_round_trip() {
        for id in GeneratorId::ALL {
            assert_eq!(id.name().parse::<GeneratorId>().unwrap(), id);
        }
        assert!("sales".parse::<GeneratorId>().is_err());
    }

    #[test]
    fn test_game_data() {
        let table = GeneratorId::Game.generate().unwrap();
        assert_eq!(table.kind(), TableKind::Flat);
        assert_eq!(table.row_count(), Some(10_000));
        assert_eq!(table.num_columns(), 5);

        // player 100 against enemy 1: diff 99
        let hp = table.column("enemy_hp").unwrap().values();
        let expected = (1000.0 * 100f64.ln()).ceil() as i64;
        assert_eq!(hp.key_at(99 * 100), Some(graphit_core::ScalarKey::Integer(expected)));
    }

    #[test]
    fn test_tri_surface_is_flat_point_cloud() {
        let table = GeneratorId::TriSurface.generate().unwrap();
        assert_eq!(table.kind(), TableKind::Flat);
        assert_eq!(table.row_count(), Some(289));
    }

    #[test]
    fn test_grid_shapes() {
        let peaks = GeneratorId::Peaks.generate().unwrap();
        assert_eq!(peaks.column(Z).unwrap().shape(), &Shape::new(vec![30, 50]));

        let wave = GeneratorId::Waveform.generate().unwrap();
        assert_eq!(wave.column(X).unwrap().shape(), &Shape::new(vec![200, 200]));

        let sphere = GeneratorId::Sphere.generate().unwrap();
        assert_eq!(sphere.kind(), TableKind::Shaped);
        assert_eq!(sphere.column(Y).unwrap().shape(), &Shape::new(vec![100, 100]));
    }

    #[test]
    fn test_generation_is_deterministic() {
        for id in GeneratorId::ALL {
            assert_eq!(id.generate().unwrap(), id.generate().unwrap());
        }
    }
}
