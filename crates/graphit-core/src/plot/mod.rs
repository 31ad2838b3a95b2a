//! Plot map: the persisted configuration of one plot
//!
//! A plot map carries a snapshot of the table it was configured against.
//! Flat snapshots are stored as a JSON string of records, shaped snapshots
//! as an object of nested arrays.

mod kind;

use serde::{Deserialize, Serialize};

use crate::table::Table;

pub use kind::{Axis, PlotFamily, PlotKind, RenderCommand, Series};

/// Named colors offered for plot lines and markers
pub const COLORS: &[&str] = &[
    "blue", "green", "red", "cyan", "magenta", "yellow", "black", "white",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotMap {
    /// Two-digit identifier, also the file name suffix
    pub id: String,
    pub title: String,
    pub color: String,
    pub graph_name: String,
    pub x_coord: String,
    pub y_coord: String,
    pub z_coord: String,
    pub x_grid: bool,
    pub y_grid: bool,
    pub dpi: u32,
    pub fit: bool,
    pub label_all: bool,
    pub horz_stretch: i32,
    pub vert_stretch: i32,
    /// Cache artifact the snapshot was taken from
    pub data_name: String,
    #[serde(with = "snapshot")]
    pub data: Option<Table>,
}

impl Default for PlotMap {
    fn default() -> Self {
        Self {
            id: Self::format_id(0),
            title: "Title of Plot Map".to_string(),
            color: COLORS[0].to_string(),
            graph_name: String::new(),
            x_coord: String::new(),
            y_coord: String::new(),
            z_coord: String::new(),
            x_grid: false,
            y_grid: false,
            dpi: 100,
            fit: false,
            label_all: false,
            horz_stretch: 0,
            vert_stretch: 0,
            data_name: String::new(),
            data: None,
        }
    }
}

impl PlotMap {
    pub fn new(id: u32) -> Self {
        Self {
            id: Self::format_id(id),
            ..Self::default()
        }
    }

    pub fn format_id(id: u32) -> String {
        format!("{:02}", id)
    }

    pub fn numeric_id(&self) -> Option<u32> {
        self.id.parse().ok()
    }

    pub fn kind(&self) -> Option<PlotKind> {
        self.graph_name.parse().ok()
    }

    /// Point the map at new data
    ///
    /// Coordinate bindings that no longer name a column are cleared, as is
    /// a plot type that does not apply to the new data name.
    pub fn set_data(&mut self, data_name: &str, table: Table) {
        for coord in [&mut self.x_coord, &mut self.y_coord, &mut self.z_coord] {
            if table.column(coord).is_none() {
                coord.clear();
            }
        }
        let still_applicable = self
            .kind()
            .map(|kind| PlotKind::available_for(data_name).contains(&kind))
            .unwrap_or(false);
        if !still_applicable {
            self.graph_name.clear();
        }
        self.data_name = data_name.to_string();
        self.data = Some(table);
    }

    /// Render against the embedded snapshot
    pub fn render(&self) -> crate::Result<RenderCommand> {
        let kind: PlotKind = self.graph_name.parse()?;
        let table = self.data.as_ref().ok_or_else(|| crate::CoreError::IncompatiblePlot {
            plot: kind.name().to_string(),
            reason: "plot map has no data".to_string(),
        })?;
        kind.render(table, self)
    }
}

mod snapshot {
    use serde::de::Deserializer;
    use serde::ser::{Error as _, Serializer};
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    use crate::table::{json, Table};

    pub fn serialize<S: Serializer>(
        data: &Option<Table>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match data {
            None => serializer.serialize_none(),
            Some(table) if table.is_flat() => {
                let text =
                    serde_json::to_string(&json::to_records(table)).map_err(S::Error::custom)?;
                serializer.serialize_str(&text)
            }
            Some(table) => json::to_nested(table).serialize(serializer),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Table>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(decode(&value))
    }

    /// Unreadable snapshots degrade to no data
    pub(super) fn decode(value: &Value) -> Option<Table> {
        let decoded = match value {
            Value::Null => return None,
            Value::String(text) => serde_json::from_str::<Value>(text)
                .map_err(|e| e.to_string())
                .and_then(|records| json::from_tabular(&records).map_err(|e| e.to_string())),
            Value::Object(_) => json::from_nested(value).map_err(|e| e.to_string()),
            other => Err(format!("unexpected snapshot value: {}", other)),
        };
        match decoded {
            Ok(table) => Some(table),
            Err(err) => {
                tracing::warn!("Discarding unreadable plot data snapshot: {}", err);
                None
            }
        }
    }
}
