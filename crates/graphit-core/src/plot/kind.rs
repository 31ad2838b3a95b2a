//! Plot type registry
//!
//! Each plot type maps to a pure function from the bound columns to a
//! [`RenderCommand`]; drawing it is left to the front end.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PlotMap;
use crate::prefix::Prefix;
use crate::table::{ColumnData, ScalarType, Shape, Table};
use crate::{CoreError, Result};

/// Which data layout a plot type consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlotFamily {
    /// Flat, data-frame style columns
    Standard,
    /// Flat point clouds drawn through a triangulation
    Triangulated,
    /// Two-dimensional grids of equal shape
    Isometric,
}

impl From<Prefix> for PlotFamily {
    fn from(prefix: Prefix) -> Self {
        match prefix {
            Prefix::None => PlotFamily::Standard,
            Prefix::Isometric => PlotFamily::Isometric,
            Prefix::IsometricTriangulated => PlotFamily::Triangulated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

macro_rules! plot_kinds {
    ($($variant:ident => $name:literal, $family:ident, [$($axis:ident),+];)*) => {
        /// Every plot type the front end can draw
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum PlotKind {
            $($variant,)*
        }

        impl PlotKind {
            pub const ALL: &'static [PlotKind] = &[$(PlotKind::$variant,)*];

            /// Display name, also the persisted `graph_name`
            pub fn name(&self) -> &'static str {
                match self {
                    $(PlotKind::$variant => $name,)*
                }
            }

            pub fn family(&self) -> PlotFamily {
                match self {
                    $(PlotKind::$variant => PlotFamily::$family,)*
                }
            }

            pub fn required_axes(&self) -> &'static [Axis] {
                match self {
                    $(PlotKind::$variant => &[$(Axis::$axis),+],)*
                }
            }
        }
    };
}

plot_kinds! {
    Standard => "Standard Plot", Standard, [X, Y];
    Scatter => "Scatter Plot", Standard, [X, Y, Z];
    Bar => "Bar Plot", Standard, [X, Y];
    Bar3d => "3-D Bar Plot", Standard, [X, Y];
    Stem => "Stem Plot", Standard, [X, Y];
    Stack => "Stack Plot", Standard, [X, Y];
    Stair => "Stair Plot", Standard, [Y];
    Hist => "Hist Plot", Standard, [X];
    Box => "Box Plot", Standard, [X];
    Error => "Error Plot", Standard, [X, Y];
    Violin => "Violin Plot", Standard, [X];
    Event => "Event Plot", Standard, [X];
    HistScatter => "Hist Scatter Plot", Standard, [X, Y];
    HexBin => "Hex Bin Plot", Standard, [X, Y];
    Pie => "Pie Plot", Standard, [X];
    Ecdf => "ECDF Plot", Standard, [X];
    Barb => "Barb Plot", Standard, [X, Y];
    Quiver => "Quiver Plot", Standard, [X, Y];
    TriContour => "Tri Contour Plot", Triangulated, [X, Y, Z];
    TriContourFill => "Tri Contour Fill Plot", Triangulated, [X, Y, Z];
    Tri => "Tri Plot", Triangulated, [X, Y];
    TriSurf => "Tri Surf Plot", Triangulated, [X, Y, Z];
    IsoWireframe => "Iso Wireframe Plot", Isometric, [X, Y, Z];
    IsoWire => "Iso Wire Plot", Isometric, [X, Y, Z];
    IsoSurface => "Iso Surface Plot", Isometric, [X, Y, Z];
    IsoSurfaceHighlight => "Iso Surface Highlight Plot", Isometric, [X, Y, Z];
    IsoStandard => "Iso Standard Plot", Isometric, [X, Y, Z];
    IsoScatter => "Iso Scatter Plot", Isometric, [X, Y, Z];
}

impl PlotKind {
    /// Plot types applicable to data cached under `data_name`
    pub fn available_for(data_name: &str) -> Vec<PlotKind> {
        if data_name.is_empty() {
            return Vec::new();
        }
        let family = PlotFamily::from(Prefix::classify(data_name));
        Self::ALL
            .iter()
            .copied()
            .filter(|kind| kind.family() == family)
            .collect()
    }

    /// Bind the plot map's coordinate columns and produce a draw command
    pub fn render(&self, table: &Table, plot: &PlotMap) -> Result<RenderCommand> {
        let mut command = RenderCommand {
            kind: *self,
            title: plot.title.clone(),
            x: None,
            y: None,
            z: None,
        };

        let mut bound_shape: Option<Shape> = None;
        for axis in self.required_axes() {
            let column_name = match axis {
                Axis::X => &plot.x_coord,
                Axis::Y => &plot.y_coord,
                Axis::Z => &plot.z_coord,
            };
            if column_name.is_empty() {
                return Err(self.incompatible(format!("no column bound to {:?}", axis)));
            }
            let column = table
                .column(column_name)
                .ok_or_else(|| CoreError::MissingColumn(column_name.clone()))?;

            let series = self.series(column_name, column)?;
            match &bound_shape {
                Some(shape) if *shape != series.shape => {
                    return Err(self.incompatible(format!(
                        "column '{}' has shape {} but {} was expected",
                        column_name, series.shape, shape
                    )))
                }
                _ => bound_shape = Some(series.shape.clone()),
            }

            match axis {
                Axis::X => command.x = Some(series),
                Axis::Y => command.y = Some(series),
                Axis::Z => command.z = Some(series),
            }
        }

        Ok(command)
    }

    fn series(&self, name: &str, column: &ColumnData) -> Result<Series> {
        if column.scalar_type() == ScalarType::String {
            return Err(self.incompatible(format!("column '{}' is not numeric", name)));
        }

        let shape = if column.shape().is_scalar() {
            Shape::new(vec![column.len()])
        } else {
            column.shape().clone()
        };
        match self.family() {
            PlotFamily::Isometric if shape.rank() != 2 => {
                return Err(self.incompatible(format!("column '{}' is not a 2-D grid", name)))
            }
            PlotFamily::Standard | PlotFamily::Triangulated if shape.rank() != 1 => {
                return Err(self.incompatible(format!("column '{}' is not one-dimensional", name)))
            }
            _ => {}
        }

        let values = (0..column.len())
            .map(|idx| column.values().as_f64(idx).unwrap_or(f64::NAN))
            .collect();
        Ok(Series {
            column: name.to_string(),
            values,
            shape,
        })
    }

    fn incompatible(&self, reason: String) -> CoreError {
        CoreError::IncompatiblePlot {
            plot: self.name().to_string(),
            reason,
        }
    }
}

impl fmt::Display for PlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PlotKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| CoreError::UnknownPlotKind(s.to_string()))
    }
}

/// Numeric column bound to one plot axis; nulls are NaN
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub column: String,
    pub values: Vec<f64>,
    pub shape: Shape,
}

/// Everything a renderer needs to draw one plot
#[derive(Debug, Clone, PartialEq)]
pub struct RenderCommand {
    pub kind: PlotKind,
    pub title: String,
    pub x: Option<Series>,
    pub y: Option<Series>,
    pub z: Option<Series>,
}
