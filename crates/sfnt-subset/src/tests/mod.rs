//! Shared test fixtures: a synthetic TrueType font and helpers to validate produced fonts.

use std::{env, io::Write, process::Command, sync::OnceLock};

use allsorts::{binary::read::ReadScope, font::MatchingPresentation, font_data::FontData};

use crate::{
    font::{CmapTable, NameTable},
    write::{write_glyphs, write_head, write_hmtx, write_u16, write_u32},
    CmapId, Font, TableTag,
};

/// Glyphs of the test font, in the glyph ID order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TestGlyph {
    Notdef,
    LetterA,
    LetterB,
    LetterC,
    Dieresis,
    LetterADieresis,
    Space,
    Emoji,
}

impl TestGlyph {
    pub(crate) const ALL: [Self; 8] = [
        Self::Notdef,
        Self::LetterA,
        Self::LetterB,
        Self::LetterC,
        Self::Dieresis,
        Self::LetterADieresis,
        Self::Space,
        Self::Emoji,
    ];

    /// Instructions of hinted simple glyphs.
    pub(crate) const INSTRUCTIONS: &'static [u8] = &[0xb0, 0x01, 0x1e, 0x2f];
    /// Flags and coordinates shared by all simple glyphs: a rectangle with 4 on-curve points.
    pub(crate) const POINTS: &'static [u8] = &[
        1, 1, 1, 1, // flags
        0, 10, 0, 0, 0, 100, 0, 0, // x deltas
        0, 0, 0, 100, 0, 0, 255, 156, // y deltas
    ];
    /// Instructions after the last component of a composite glyph (including the length).
    pub(crate) const COMPOSITE_INSTRUCTIONS: &'static [u8] = &[0, 4, 0xb0, 0x01, 0x1e, 0x2f];

    pub(crate) const fn id(self) -> u16 {
        self as u16
    }

    pub(crate) const fn char(self) -> Option<char> {
        Some(match self {
            Self::Notdef | Self::Dieresis => return None,
            Self::LetterA => 'A',
            Self::LetterB => 'B',
            Self::LetterC => 'C',
            Self::LetterADieresis => 'Ä',
            Self::Space => ' ',
            Self::Emoji => '😀',
        })
    }

    pub(crate) fn is_composite(self) -> bool {
        matches!(self, Self::LetterADieresis)
    }

    pub(crate) fn has_instructions(self) -> bool {
        matches!(self, Self::LetterA | Self::LetterADieresis)
    }

    pub(crate) fn component_indices(self) -> &'static [u16] {
        const DIERESIS_COMPONENTS: [u16; 2] = [TestGlyph::LetterA.id(), TestGlyph::Dieresis.id()];

        match self {
            Self::LetterADieresis => &DIERESIS_COMPONENTS,
            _ => &[],
        }
    }

    /// Returns `(advance, lsb)` metrics. The last 2 glyphs share the advance width.
    pub(crate) fn metrics(self) -> (u16, u16) {
        match self {
            Self::Notdef => (500, 50),
            Self::LetterA | Self::LetterADieresis => (600, 10),
            Self::LetterB => (600, 20),
            Self::LetterC => (620, 30),
            Self::Dieresis => (300, 40),
            Self::Space => (250, 0),
            Self::Emoji => (250, 5),
        }
    }

    pub(crate) fn to_bytes(self) -> Vec<u8> {
        let mut buffer = vec![];
        if matches!(self, Self::Space) {
            return buffer;
        }

        let (_, lsb) = self.metrics();
        if self.is_composite() {
            write_u16(&mut buffer, u16::MAX); // numberOfContours = -1
            for coord in [lsb, 0, lsb + 100, 200] {
                write_u16(&mut buffer, coord);
            }
            // ARG_1_AND_2_ARE_WORDS | ARGS_ARE_XY_VALUES | MORE_COMPONENTS
            write_u16(&mut buffer, 0x0023);
            write_u16(&mut buffer, Self::LetterA.id());
            write_u32(&mut buffer, 0);
            // ARGS_ARE_XY_VALUES | WE_HAVE_INSTRUCTIONS
            write_u16(&mut buffer, 0x0102);
            write_u16(&mut buffer, Self::Dieresis.id());
            buffer.extend_from_slice(&[0, 100]);
            buffer.extend_from_slice(Self::COMPOSITE_INSTRUCTIONS);
        } else {
            write_u16(&mut buffer, 1); // numberOfContours
            for coord in [lsb, 0, lsb + 100, 100] {
                write_u16(&mut buffer, coord);
            }
            write_u16(&mut buffer, 3); // endPtsOfContours[0]
            let instructions = if self.has_instructions() {
                Self::INSTRUCTIONS
            } else {
                &[]
            };
            write_u16(&mut buffer, instructions.len().try_into().unwrap());
            buffer.extend_from_slice(instructions);
            buffer.extend_from_slice(Self::POINTS);
        }
        buffer
    }
}

/// Offsets of the `maxp` fields with non-zero values in the test font.
pub(crate) const MAXP_HINTING_FIELDS: [usize; 6] = [16, 18, 20, 22, 24, 26];

/// Tables unrelated to outlines that are copied to the test font verbatim.
pub(crate) const EXTRA_TABLES: [&[u8; 4]; 16] = [
    b"GDEF", b"GPOS", b"GSUB", b"kern", b"hdmx", b"vmtx", b"VDMX", b"LTSH", b"DSIG", b"vhea",
    b"mort", b"morx", b"fpgm", b"prep", b"cvt ", b"gasp",
];

pub(crate) fn tag_u32(tag: TableTag) -> u32 {
    u32::from_be_bytes(tag.0)
}

pub(crate) fn build_name_table(names: &[(u16, &str)]) -> Vec<u8> {
    let mut records = vec![];
    let mut storage = vec![];
    for &(name_id, name) in names {
        let offset = storage.len();
        storage.extend(name.encode_utf16().flat_map(u16::to_be_bytes));
        write_u16(&mut records, 3); // Windows platform
        write_u16(&mut records, 1); // Unicode BMP
        write_u16(&mut records, 0x0409); // English (US)
        write_u16(&mut records, name_id);
        write_u16(&mut records, (storage.len() - offset).try_into().unwrap());
        write_u16(&mut records, offset.try_into().unwrap());
    }

    let mut buffer = vec![];
    write_u16(&mut buffer, 0); // version
    write_u16(&mut buffer, names.len().try_into().unwrap());
    write_u16(&mut buffer, (6 + records.len()).try_into().unwrap());
    buffer.extend(records);
    buffer.extend(storage);
    buffer
}

fn build_head(loca_format_bytes: &[u8]) -> Vec<u8> {
    let mut head = vec![];
    write_u32(&mut head, 0x_0001_0000); // version
    write_u32(&mut head, 0x_0001_8000); // fontRevision = 1.5
    write_u32(&mut head, 0); // checkSumAdjustment
    write_u32(&mut head, 0x_5f0f_3cf5); // magic
    write_u16(&mut head, 0x000b); // flags
    write_u16(&mut head, 1_000); // unitsPerEm
    head.extend_from_slice(&[0; 16]); // created, modified
    for coord in [0, 0, 700, 200] {
        write_u16(&mut head, coord);
    }
    write_u16(&mut head, 0); // macStyle
    write_u16(&mut head, 8); // lowestRecPPEM
    write_u16(&mut head, 2); // fontDirectionHint
    head.extend_from_slice(loca_format_bytes);
    write_u16(&mut head, 0); // glyphDataFormat
    assert_eq!(head.len(), Font::HEAD_LEN);
    head
}

fn build_hhea(number_of_h_metrics: u16) -> Vec<u8> {
    let mut hhea = vec![];
    write_u32(&mut hhea, 0x_0001_0000);
    for value in [800, 200_u16.wrapping_neg(), 0, 620, 0, 0, 700, 1, 0, 0] {
        write_u16(&mut hhea, value);
    }
    hhea.extend_from_slice(&[0; 8]); // reserved
    write_u16(&mut hhea, 0); // metricDataFormat
    write_u16(&mut hhea, number_of_h_metrics);
    hhea
}

fn build_maxp() -> Vec<u8> {
    let mut maxp = vec![];
    write_u32(&mut maxp, 0x_0001_0000);
    write_u16(&mut maxp, TestGlyph::ALL.len().try_into().unwrap());
    // maxPoints, maxContours, maxCompositePoints, maxCompositeContours, maxZones
    for value in [8, 1, 8, 2, 2] {
        write_u16(&mut maxp, value);
    }
    // maxTwilightPoints .. maxSizeOfInstructions
    for value in [16, 32, 10, 1, 64, 4] {
        write_u16(&mut maxp, value);
    }
    write_u16(&mut maxp, 2); // maxComponentElements
    write_u16(&mut maxp, 1); // maxComponentDepth
    maxp
}

fn build_os2() -> Vec<u8> {
    let mut os2 = vec![];
    write_u16(&mut os2, 4); // version
    write_u16(&mut os2, 450); // xAvgCharWidth
    write_u16(&mut os2, 700); // usWeightClass
    write_u16(&mut os2, 5); // usWidthClass
    write_u16(&mut os2, 8); // fsType
    os2.extend_from_slice(&[0; 20]); // subscript / superscript / strikeout metrics
    write_u16(&mut os2, 0); // sFamilyClass
    os2.extend_from_slice(&[2, 11, 6, 3, 0, 0, 0, 0, 0, 4]); // PANOSE
    for range in [1, 0, 0, 0] {
        write_u32(&mut os2, range);
    }
    os2.extend_from_slice(b"TEST");
    write_u16(&mut os2, 1); // fsSelection: italic
    write_u16(&mut os2, 0x20); // usFirstCharIndex
    write_u16(&mut os2, 0xffff); // usLastCharIndex
    for value in [800, 200_u16.wrapping_neg(), 0, 800, 200] {
        write_u16(&mut os2, value);
    }
    for range in [1, 0] {
        write_u32(&mut os2, range);
    }
    for value in [500, 700, 0, 0x20, 2] {
        write_u16(&mut os2, value);
    }
    assert_eq!(os2.len(), 96);
    os2
}

fn build_post() -> Vec<u8> {
    let mut post = vec![];
    write_u32(&mut post, 0x_0002_0000);
    post.extend_from_slice(&[0; 28]); // italicAngle .. maxMemType1
    write_u16(&mut post, TestGlyph::ALL.len().try_into().unwrap());
    // Indices in the standard Macintosh glyph set, or custom names starting from 258
    for idx in [0, 36, 37, 38, 258, 259, 3, 260] {
        write_u16(&mut post, idx);
    }
    for name in ["dieresis", "Adieresis", "u1F600"] {
        post.push(name.len().try_into().unwrap());
        post.extend_from_slice(name.as_bytes());
    }
    post
}

fn raw_test_font() -> Font {
    let metrics: Vec<_> = TestGlyph::ALL.iter().map(|glyph| glyph.metrics()).collect();
    let mut hmtx = vec![];
    let number_of_h_metrics = write_hmtx(&metrics, &mut hmtx);

    let (glyf, loca, loca_format) = write_glyphs(TestGlyph::ALL.len(), |i, buffer| {
        buffer.extend(TestGlyph::ALL[i].to_bytes());
        Ok::<_, ()>(())
    })
    .unwrap();
    let mut head = vec![];
    write_head(&build_head(&[0, 0]), loca_format, &mut head);

    let mut char_map: Vec<_> = TestGlyph::ALL
        .iter()
        .filter_map(|glyph| Some((glyph.char()?, glyph.id())))
        .collect();
    char_map.sort_unstable();
    let mut cmap = vec![];
    CmapTable::write_for_ids(
        &char_map,
        &[CmapId::WINDOWS_BMP, CmapId::WINDOWS_UCS4],
        &mut cmap,
    )
    .unwrap();

    let name = build_name_table(&[
        (NameTable::FAMILY, "Test Sans"),
        (NameTable::SUBFAMILY, "Regular"),
        (NameTable::FULL_NAME, "Test Sans Regular"),
        (NameTable::VERSION, "Version 1.500"),
    ]);

    let extra_tables = EXTRA_TABLES.iter().enumerate().map(|(i, &tag)| {
        let mut data = vec![0, 1, 0, 0];
        data.extend_from_slice(tag);
        data.extend(std::iter::repeat_n(u8::try_from(i).unwrap(), i + 1));
        (TableTag(*tag), data)
    });
    let tables = [
        (TableTag::HEAD, head),
        (TableTag::HHEA, build_hhea(number_of_h_metrics)),
        (TableTag::MAXP, build_maxp()),
        (TableTag::HMTX, hmtx),
        (TableTag::CMAP, cmap),
        (TableTag::LOCA, loca),
        (TableTag::GLYF, glyf),
        (TableTag::NAME, name),
        (TableTag::OS2, build_os2()),
        (TableTag::POST, build_post()),
    ];
    Font::from_tables(Font::SFNT_VERSION, tables.into_iter().chain(extra_tables))
}

/// Returns serialized test font.
pub(crate) fn test_font_bytes() -> Vec<u8> {
    static BYTES: OnceLock<Vec<u8>> = OnceLock::new();
    BYTES.get_or_init(|| raw_test_font().to_sfnt()).clone()
}

pub(crate) fn test_font() -> Font {
    Font::new(&test_font_bytes()).unwrap()
}

/// Optional external validator for produced fonts (`ots-sanitize` from the OpenType Sanitizer).
#[derive(Debug)]
pub(crate) struct OpenTypeSanitizer {
    path: Option<String>,
}

impl Default for OpenTypeSanitizer {
    fn default() -> Self {
        let Ok(path) = env::var("OTS_SANITIZER") else {
            return Self { path: None };
        };
        let output = Command::new(&path)
            .arg("--version")
            .output()
            .unwrap_or_else(|err| {
                panic!("failed getting version for ots-sanitize at {path}: {err}");
            });
        assert!(
            output.status.success(),
            "failed getting version for ots-sanitize at {path}: non-zero exit code"
        );
        Self { path: Some(path) }
    }
}

impl OpenTypeSanitizer {
    pub(crate) fn get() -> &'static Self {
        static SANITIZER: OnceLock<OpenTypeSanitizer> = OnceLock::new();
        SANITIZER.get_or_init(Self::default)
    }

    pub(crate) fn validate(&self, content: &[u8]) {
        let Some(path) = &self.path else {
            println!("OTS_SANITIZER env var is missing; skipping checks");
            return;
        };

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.as_file_mut().write_all(content).unwrap();
        file.as_file_mut().flush().unwrap();
        let file_path = file.into_temp_path();

        let output = Command::new(path)
            .arg(&file_path)
            .output()
            .expect("failed running ots-sanitize");
        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            panic!("ots-sanitize failed:\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}");
        }
    }
}

/// Checks that the produced font (sfnt, WOFF or WOFF2) maps the expected chars to non-missing glyphs
/// using an independent font reader.
pub(crate) fn assert_valid_font(raw: &[u8], expected_chars: impl IntoIterator<Item = char>) {
    let font_file = ReadScope::new(raw).read::<FontData<'_>>().unwrap();
    let font_provider = font_file.table_provider(0).unwrap();
    let mut font = allsorts::Font::new(font_provider).unwrap();
    for ch in expected_chars {
        let (glyph_id, _) = font.lookup_glyph_index(ch, MatchingPresentation::NotRequired, None);
        assert_ne!(glyph_id, 0, "{ch:?}");
    }
    OpenTypeSanitizer::get().validate(raw);
}

#[test]
fn test_font_is_consistent() {
    let font = test_font();
    assert_eq!(font.table_tags().len(), 10 + EXTRA_TABLES.len());
    let cmap = font.char_map().unwrap();
    for glyph in TestGlyph::ALL {
        if let Some(ch) = glyph.char() {
            assert_eq!(cmap.map_char(ch).unwrap(), glyph.id(), "{glyph:?}");
        }
    }
}
