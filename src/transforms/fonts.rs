//! Font chain: sfnt to WOFF and WOFF2
//!
//! TrueType and CFF-flavoured OpenType fonts are re-packaged twice:
//!
//! - WOFF 1.0, every table zlib-compressed on its own (stored raw when
//!   compression does not shrink it)
//! - WOFF 2.0, all tables in one brotli stream; `glyf` and `loca` use the
//!   null transform so the table bytes are carried through unchanged
//!
//! Collections and already-packaged formats are copied verbatim.

use super::{Artifact, SourceFile, Transform, TransformError};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::{Path, PathBuf};

const SFNT_TRUETYPE: u32 = 0x0001_0000;
const SFNT_APPLE_TRUETYPE: u32 = 0x7472_7565; // 'true'
const SFNT_CFF: u32 = 0x4F54_544F; // 'OTTO'

const SFNT_HEADER_LEN: usize = 12;
const SFNT_RECORD_LEN: usize = 16;

const WOFF_SIGNATURE: u32 = 0x774F_4646; // 'wOFF'
const WOFF_HEADER_LEN: usize = 44;
const WOFF_ENTRY_LEN: usize = 20;

const WOFF2_SIGNATURE: u32 = 0x774F_4632; // 'wOF2'
const WOFF2_HEADER_LEN: usize = 48;
const WOFF2_ARBITRARY_TAG: u8 = 63;
const WOFF2_NULL_TRANSFORM_GLYF: u8 = 3 << 6;

/// Tags with a one-byte code in the WOFF2 table directory, in code order.
const WOFF2_KNOWN_TAGS: [&[u8; 4]; 63] = [
    b"cmap", b"head", b"hhea", b"hmtx", b"maxp", b"name", b"OS/2", b"post", b"cvt ", b"fpgm",
    b"glyf", b"loca", b"prep", b"CFF ", b"VORG", b"EBDT", b"EBLC", b"gasp", b"hdmx", b"kern",
    b"LTSH", b"PCLT", b"VDMX", b"vhea", b"vmtx", b"BASE", b"GDEF", b"GPOS", b"GSUB", b"EBSC",
    b"JSTF", b"MATH", b"CBDT", b"CBLC", b"COLR", b"CPAL", b"SVG ", b"sbix", b"acnt", b"avar",
    b"bdat", b"bloc", b"bsln", b"cvar", b"fdsc", b"feat", b"fmtx", b"fvar", b"gvar", b"hsty",
    b"just", b"lcar", b"mort", b"morx", b"opbd", b"prop", b"trak", b"Zapf", b"Silf", b"Glat",
    b"Gloc", b"Feat", b"Sill",
];

/// One table of an sfnt font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontTable<'a> {
    /// Four-byte table tag
    pub tag: [u8; 4],
    /// Checksum from the sfnt table record
    pub checksum: u32,
    /// Table bytes (unpadded)
    pub data: &'a [u8],
}

/// A parsed single-font sfnt file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sfnt<'a> {
    /// sfnt version, carried into the WOFF `flavor` field
    pub flavor: u32,
    /// Tables in ascending tag order
    pub tables: Vec<FontTable<'a>>,
}

impl<'a> Sfnt<'a> {
    /// Parse the sfnt header and table directory.
    pub fn parse(data: &'a [u8]) -> Result<Self, TransformError> {
        let flavor = read_u32(data, 0)?;
        if !matches!(flavor, SFNT_TRUETYPE | SFNT_APPLE_TRUETYPE | SFNT_CFF) {
            return Err(TransformError::Font(format!("unsupported sfnt version 0x{flavor:08X}")));
        }
        let num_tables = usize::from(read_u16(data, 4)?);
        if num_tables == 0 {
            return Err(TransformError::Font("font has no tables".to_string()));
        }

        let mut tables = Vec::with_capacity(num_tables);
        for i in 0..num_tables {
            let record = SFNT_HEADER_LEN + i * SFNT_RECORD_LEN;
            let tag = read_tag(data, record)?;
            let checksum = read_u32(data, record + 4)?;
            let offset = read_u32(data, record + 8)? as usize;
            let length = read_u32(data, record + 12)? as usize;
            let table = offset
                .checked_add(length)
                .and_then(|end| data.get(offset..end))
                .ok_or_else(|| {
                    TransformError::Font(format!(
                        "table '{}' lies outside the file",
                        String::from_utf8_lossy(&tag)
                    ))
                })?;
            tables.push(FontTable { tag, checksum, data: table });
        }
        tables.sort_by(|a, b| a.tag.cmp(&b.tag));

        Ok(Self { flavor, tables })
    }

    /// Table by tag.
    pub fn table(&self, tag: &[u8; 4]) -> Option<&FontTable<'a>> {
        self.tables.iter().find(|t| &t.tag == tag)
    }

    /// Size of the font as a plain sfnt file with padded tables.
    pub fn sfnt_size(&self) -> usize {
        SFNT_HEADER_LEN
            + SFNT_RECORD_LEN * self.tables.len()
            + self.tables.iter().map(|t| padded(t.data.len())).sum::<usize>()
    }

    /// `fontRevision` from `head` as (major, minor), or (1, 0) without one.
    pub fn revision(&self) -> (u16, u16) {
        self.table(b"head")
            .and_then(|head| Some((read_u16(head.data, 4).ok()?, read_u16(head.data, 6).ok()?)))
            .unwrap_or((1, 0))
    }
}

/// Package a font as WOFF 1.0.
pub fn encode_woff(font: &Sfnt<'_>) -> Result<Vec<u8>, TransformError> {
    let data_start = WOFF_HEADER_LEN + WOFF_ENTRY_LEN * font.tables.len();
    let mut directory = Vec::with_capacity(WOFF_ENTRY_LEN * font.tables.len());
    let mut body = Vec::new();

    for table in &font.tables {
        let compressed = zlib(table.data)?;
        let stored = if compressed.len() < table.data.len() { &compressed[..] } else { table.data };

        directory.extend_from_slice(&table.tag);
        push_u32(&mut directory, to_u32(data_start + body.len())?);
        push_u32(&mut directory, to_u32(stored.len())?);
        push_u32(&mut directory, to_u32(table.data.len())?);
        push_u32(&mut directory, table.checksum);

        body.extend_from_slice(stored);
        pad_to_4(&mut body);
    }

    let (major, minor) = font.revision();
    let mut out = Vec::with_capacity(data_start + body.len());
    push_u32(&mut out, WOFF_SIGNATURE);
    push_u32(&mut out, font.flavor);
    push_u32(&mut out, to_u32(data_start + body.len())?);
    push_u16(&mut out, table_count(font)?);
    push_u16(&mut out, 0);
    push_u32(&mut out, to_u32(font.sfnt_size())?);
    push_u16(&mut out, major);
    push_u16(&mut out, minor);
    // metadata and private blocks: offset, length (, original length)
    for _ in 0..5 {
        push_u32(&mut out, 0);
    }
    out.extend_from_slice(&directory);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Package a font as WOFF 2.0.
pub fn encode_woff2(font: &Sfnt<'_>) -> Result<Vec<u8>, TransformError> {
    let mut directory = Vec::new();
    let mut stream = Vec::new();

    for table in &font.tables {
        let code = WOFF2_KNOWN_TAGS
            .iter()
            .position(|known| **known == table.tag)
            .map(|i| i as u8)
            .unwrap_or(WOFF2_ARBITRARY_TAG);
        let transform = if &table.tag == b"glyf" || &table.tag == b"loca" {
            WOFF2_NULL_TRANSFORM_GLYF
        } else {
            0
        };

        directory.push(code | transform);
        if code == WOFF2_ARBITRARY_TAG {
            directory.extend_from_slice(&table.tag);
        }
        push_base128(&mut directory, to_u32(table.data.len())?);
        stream.extend_from_slice(table.data);
    }

    let compressed = brotli_compress(&stream)?;
    let length = padded(WOFF2_HEADER_LEN + directory.len() + compressed.len());

    let (major, minor) = font.revision();
    let mut out = Vec::with_capacity(length);
    push_u32(&mut out, WOFF2_SIGNATURE);
    push_u32(&mut out, font.flavor);
    push_u32(&mut out, to_u32(length)?);
    push_u16(&mut out, table_count(font)?);
    push_u16(&mut out, 0);
    push_u32(&mut out, to_u32(font.sfnt_size())?);
    push_u32(&mut out, to_u32(compressed.len())?);
    push_u16(&mut out, major);
    push_u16(&mut out, minor);
    for _ in 0..5 {
        push_u32(&mut out, 0);
    }
    out.extend_from_slice(&directory);
    out.extend_from_slice(&compressed);
    pad_to_4(&mut out);
    Ok(out)
}

/// Converts `*.ttf` / `*.otf` to WOFF and WOFF2; copies other font files.
#[derive(Debug, Clone, Copy, Default)]
pub struct FontTransform;

impl FontTransform {
    fn converts(relative: &Path) -> bool {
        relative
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("otf"))
            .unwrap_or(false)
    }
}

impl Transform for FontTransform {
    fn outputs(&self, relative: &Path) -> Vec<PathBuf> {
        if Self::converts(relative) {
            vec![relative.with_extension("woff"), relative.with_extension("woff2")]
        } else {
            vec![relative.to_path_buf()]
        }
    }

    fn apply(&self, source: &SourceFile) -> Result<Vec<Artifact>, TransformError> {
        if !Self::converts(&source.relative) {
            return Ok(vec![Artifact::new(source.relative.clone(), source.contents.clone())]);
        }

        let font = Sfnt::parse(&source.contents)?;
        let woff = encode_woff(&font)?;
        let woff2 = encode_woff2(&font)?;
        tracing::debug!(
            "{}: {} bytes -> woff {} / woff2 {}",
            source.relative.display(),
            source.contents.len(),
            woff.len(),
            woff2.len()
        );

        Ok(vec![
            Artifact::new(source.relative.with_extension("woff"), woff),
            Artifact::new(source.relative.with_extension("woff2"), woff2),
        ])
    }
}

fn zlib(data: &[u8]) -> Result<Vec<u8>, TransformError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn brotli_compress(data: &[u8]) -> Result<Vec<u8>, TransformError> {
    let mut output = Vec::new();
    let mut reader = data;
    brotli::BrotliCompress(
        &mut reader,
        &mut output,
        &brotli::enc::BrotliEncoderParams { quality: 11, lgwin: 22, ..Default::default() },
    )
    .map_err(|e| TransformError::Font(format!("brotli: {e}")))?;
    Ok(output)
}

/// WOFF2 variable-length encoding: 7 bits per byte, most significant first.
fn push_base128(out: &mut Vec<u8>, value: u32) {
    let mut groups = [0u8; 5];
    let mut len = 0;
    let mut rest = value;
    loop {
        groups[len] = (rest & 0x7F) as u8;
        len += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }
    for i in (0..len).rev() {
        let continuation = if i > 0 { 0x80 } else { 0 };
        out.push(groups[i] | continuation);
    }
}

fn table_count(font: &Sfnt<'_>) -> Result<u16, TransformError> {
    u16::try_from(font.tables.len()).map_err(|_| TransformError::Font("too many tables".into()))
}

fn to_u32(value: usize) -> Result<u32, TransformError> {
    u32::try_from(value).map_err(|_| TransformError::Font("font too large".to_string()))
}

fn padded(len: usize) -> usize {
    (len + 3) & !3
}

fn pad_to_4(buf: &mut Vec<u8>) {
    buf.resize(padded(buf.len()), 0);
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn truncated() -> TransformError {
    TransformError::Font("truncated sfnt data".to_string())
}

fn read_tag(data: &[u8], offset: usize) -> Result<[u8; 4], TransformError> {
    data.get(offset..offset + 4).and_then(|b| b.try_into().ok()).ok_or_else(truncated)
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32, TransformError> {
    read_tag(data, offset).map(u32::from_be_bytes)
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16, TransformError> {
    data.get(offset..offset + 2)
        .and_then(|b| b.try_into().ok())
        .map(u16::from_be_bytes)
        .ok_or_else(truncated)
}
