//! The fixed set of parser output files and their per-table transforms.
//!
//! Most tables load through plain column-name intersection. The few that
//! need more are listed here so the special cases stay enumerable.

use crate::schema::QualifiedTable;

/// A side column fed from a (possibly differently named) source column and
/// normalized to `top`/`bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideColumn {
    /// Target column.
    pub target: &'static str,
    /// Preferred source column; the target name is used if it is absent.
    pub source: &'static str,
}

/// Column transforms applied on top of name intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableTransform {
    /// Side indicators to normalize.
    pub side_columns: &'static [SideColumn],
    /// Columns cast to the target's declared integer width.
    pub cast_to_target: &'static [&'static str],
    /// Drop duplicate rows (over all inserted columns) before insert.
    pub dedupe: bool,
}

impl TableTransform {
    /// Plain intersection, no transforms.
    pub const NONE: Self = Self {
        side_columns: &[],
        cast_to_target: &[],
        dedupe: false,
    };
}

/// One file the parser may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFile {
    /// File stem; the file is `{name}.csv` and the table is `{schema}.{name}`.
    pub name: &'static str,
    /// Target schema.
    pub schema: &'static str,
    /// Whether the file must be present.
    pub primary: bool,
    /// Transforms for the target table.
    pub transform: TableTransform,
}

impl OutputFile {
    /// The file name inside the output directory.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.name)
    }

    /// The target table.
    #[must_use]
    pub fn table(&self) -> QualifiedTable {
        QualifiedTable::new(self.schema, self.name)
    }
}

const fn plain(name: &'static str, schema: &'static str) -> OutputFile {
    OutputFile {
        name,
        schema,
        primary: false,
        transform: TableTransform::NONE,
    }
}

/// The primary fact file. Must be loaded first: auxiliary files without a
/// `game_id` are tagged by joining against it.
pub const EVENTS: OutputFile = OutputFile {
    name: "events",
    schema: "event",
    primary: true,
    transform: TableTransform {
        side_columns: &[SideColumn {
            target: "side",
            source: "batting_side",
        }],
        cast_to_target: &[],
        dedupe: false,
    },
};

/// All output files in load order.
pub const OUTPUT_FILES: &[OutputFile] = &[
    EVENTS,
    plain("event_audit", "event"),
    plain("event_baserunners", "event"),
    plain("event_comments", "event"),
    plain("event_fielding_play", "event"),
    plain("event_flags", "event"),
    plain("event_pitch_sequences", "event"),
    OutputFile {
        name: "game_lineup_appearances",
        schema: "game",
        primary: false,
        transform: TableTransform {
            side_columns: &[SideColumn {
                target: "side",
                source: "side",
            }],
            cast_to_target: &["lineup_position", "start_event_id", "end_event_id"],
            dedupe: false,
        },
    },
    OutputFile {
        name: "game_fielding_appearances",
        schema: "game",
        primary: false,
        transform: TableTransform {
            side_columns: &[SideColumn {
                target: "side",
                source: "side",
            }],
            cast_to_target: &["fielding_position", "start_event_id", "end_event_id"],
            dedupe: false,
        },
    },
    OutputFile {
        name: "game_earned_runs",
        schema: "game",
        primary: false,
        transform: TableTransform {
            side_columns: &[],
            cast_to_target: &["earned_runs"],
            dedupe: true,
        },
    },
    plain("games", "game"),
];

/// Looks up an output file by name.
#[must_use]
pub fn output_file(name: &str) -> Option<&'static OutputFile> {
    OUTPUT_FILES.iter().find(|f| f.name == name)
}
