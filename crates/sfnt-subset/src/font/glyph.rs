//! `Glyph` and related types.

use super::Cursor;
use crate::{
    write::{write_u16, write_u32},
    ParseError,
};

#[derive(Debug, Clone)]
pub(crate) enum Glyph<'a> {
    Empty,
    Simple {
        /// numberOfContours, xMin, yMin, xMax, yMax, endPtsOfContours
        contours: &'a [u8],
        /// Instruction bytecode (without the length prefix)
        instructions: &'a [u8],
        /// Flags and coordinates
        points: &'a [u8],
    },
    Composite {
        /// xMin, yMin, xMax, yMax
        header: [u8; 8],
        components: Vec<GlyphComponent>,
        /// Optional instructions after the last component descriptor
        instructions: &'a [u8],
    },
}

impl<'a> Glyph<'a> {
    pub(super) fn new(raw: Cursor<'a>) -> Result<Self, ParseError> {
        if raw.bytes.is_empty() {
            return Ok(Self::Empty);
        }

        let mut cursor = raw;
        let number_of_contours = cursor.read_u16()?;
        if number_of_contours > i16::MAX as u16 {
            // Composite glyph
            let header = cursor.read_byte_array::<8>()?;
            let mut has_more_components = true;
            let mut components = Vec::with_capacity(1);
            while has_more_components {
                let (component, new_has_more_components) = GlyphComponent::new(&mut cursor)?;
                components.push(component);
                has_more_components = new_has_more_components;
            }
            Ok(Self::Composite {
                header,
                components,
                instructions: cursor.bytes,
            })
        } else {
            // Simple glyph
            let contours_len = 10 + 2 * usize::from(number_of_contours);
            let mut cursor = raw;
            let contours = cursor.split_at(contours_len)?.bytes;
            let instructions_len = cursor.read_u16()?;
            let instructions = cursor.split_at(instructions_len.into())?.bytes;
            Ok(Self::Simple {
                contours,
                instructions,
                points: cursor.bytes,
            })
        }
    }

    pub(crate) fn is_composite(&self) -> bool {
        matches!(self, Self::Composite { .. })
    }

    /// Iterates over indices of glyphs this glyph references.
    pub(crate) fn component_indices(&self) -> impl Iterator<Item = u16> + '_ {
        let components = match self {
            Self::Composite { components, .. } => components.as_slice(),
            Self::Empty | Self::Simple { .. } => &[],
        };
        components.iter().map(|component| component.glyph_idx)
    }

    /// Remaps references to other glyphs using the provided closure.
    pub(crate) fn remap_components(
        &mut self,
        mut remap: impl FnMut(u16) -> Result<u16, ParseError>,
    ) -> Result<(), ParseError> {
        if let Self::Composite { components, .. } = self {
            for component in components {
                component.glyph_idx = remap(component.glyph_idx)?;
            }
        }
        Ok(())
    }

    /// Removes hinting instructions from this glyph.
    pub(crate) fn strip_instructions(&mut self) {
        match self {
            Self::Empty => { /* nothing to strip */ }
            Self::Simple { instructions, .. } => {
                *instructions = &[];
            }
            Self::Composite {
                components,
                instructions,
                ..
            } => {
                for component in components {
                    component.flags &= !GlyphComponent::WE_HAVE_INSTRUCTIONS;
                }
                *instructions = &[];
            }
        }
    }

    pub(crate) fn write(&self, writer: &mut Vec<u8>) {
        match self {
            Self::Empty => { /* do nothing */ }
            Self::Simple {
                contours,
                instructions,
                points,
            } => {
                writer.extend_from_slice(contours);
                write_u16(
                    writer,
                    instructions
                        .len()
                        .try_into()
                        .expect("instructions are read with u16 length"),
                );
                writer.extend_from_slice(instructions);
                writer.extend_from_slice(points);
            }
            Self::Composite {
                header,
                components,
                instructions,
            } => {
                write_u16(writer, u16::MAX); // numberOfContours = -1
                writer.extend_from_slice(header);
                for component in components {
                    component.write(writer);
                }
                writer.extend_from_slice(instructions);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct GlyphComponent {
    pub(crate) flags: u16,
    pub(crate) glyph_idx: u16,
    pub(crate) args: GlyphComponentArgs,
    pub(crate) transform: TransformData,
}

impl GlyphComponent {
    const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
    const WE_HAVE_A_SCALE: u16 = 0x0008;
    const MORE_COMPONENTS: u16 = 0x0020;
    const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
    const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;
    pub(crate) const WE_HAVE_INSTRUCTIONS: u16 = 0x0100;

    fn new(cursor: &mut Cursor<'_>) -> Result<(Self, bool), ParseError> {
        let flags = cursor.read_u16()?;
        let glyph_idx = cursor.read_u16()?;
        let args = if flags & Self::ARG_1_AND_2_ARE_WORDS != 0 {
            GlyphComponentArgs::U32(cursor.read_u32()?)
        } else {
            GlyphComponentArgs::U16(cursor.read_u16()?)
        };
        let transform = if flags & Self::WE_HAVE_A_SCALE != 0 {
            TransformData::Scale(cursor.read_u16()?)
        } else if flags & Self::WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            TransformData::TwoScales([cursor.read_u16()?, cursor.read_u16()?])
        } else if flags & Self::WE_HAVE_A_TWO_BY_TWO != 0 {
            TransformData::Affine([
                cursor.read_u16()?,
                cursor.read_u16()?,
                cursor.read_u16()?,
                cursor.read_u16()?,
            ])
        } else {
            TransformData::None
        };
        let this = Self {
            flags,
            glyph_idx,
            args,
            transform,
        };

        let has_more_components = flags & Self::MORE_COMPONENTS != 0;
        Ok((this, has_more_components))
    }

    fn write(&self, writer: &mut Vec<u8>) {
        write_u16(writer, self.flags);
        write_u16(writer, self.glyph_idx);
        match self.args {
            GlyphComponentArgs::U16(args) => write_u16(writer, args),
            GlyphComponentArgs::U32(args) => write_u32(writer, args),
        }
        match self.transform {
            TransformData::None => { /* do nothing */ }
            TransformData::Scale(val) => write_u16(writer, val),
            TransformData::TwoScales([x, y]) => {
                write_u16(writer, x);
                write_u16(writer, y);
            }
            TransformData::Affine([xx, xy, yx, yy]) => {
                write_u16(writer, xx);
                write_u16(writer, xy);
                write_u16(writer, yx);
                write_u16(writer, yy);
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum GlyphComponentArgs {
    U16(u16),
    U32(u32),
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum TransformData {
    None,
    Scale(u16),
    TwoScales([u16; 2]),
    Affine([u16; 4]),
}
