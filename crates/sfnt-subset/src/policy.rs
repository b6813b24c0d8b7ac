//! Sets of tables that become invalid after a font transformation.

use core::fmt;

use crate::TableTag;

/// Static set of tables removed by a transformation stage since they would be inconsistent
/// with the transformed font (e.g., reference old glyph IDs or removed hinting programs).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RemovalSet {
    name: &'static str,
    tags: &'static [TableTag],
}

impl fmt::Debug for RemovalSet {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RemovalSet")
            .field("name", &self.name)
            .field("tags", &self.tags.iter().map(ToString::to_string).collect::<Vec<_>>())
            .finish()
    }
}

impl RemovalSet {
    /// Tables dropped when subsetting: layout and metrics tables indexed by glyph ID.
    pub const SUBSETTING: Self = Self {
        name: "subsetting",
        tags: &[
            TableTag::GDEF,
            TableTag::GPOS,
            TableTag::GSUB,
            TableTag::KERN,
            TableTag::HDMX,
            TableTag::VMTX,
            TableTag::VDMX,
            TableTag::LTSH,
            TableTag::DSIG,
            TableTag::VHEA,
            TableTag(*b"mort"),
            TableTag(*b"morx"),
        ],
    };

    /// Tables dropped when stripping hints: hinting programs and device-specific metrics.
    pub const HINT_STRIPPING: Self = Self {
        name: "hint stripping",
        tags: &[
            TableTag::FPGM,
            TableTag::PREP,
            TableTag::CVT,
            TableTag::HDMX,
            TableTag::VDMX,
            TableTag::LTSH,
            TableTag::DSIG,
            TableTag::VHEA,
        ],
    };

    /// Returns a human-readable name of this set.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Checks whether the specified table is removed.
    pub fn contains(&self, tag: TableTag) -> bool {
        self.tags.contains(&tag)
    }

    /// Iterates over all tags in this set.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = TableTag> + '_ {
        self.tags.iter().copied()
    }
}
