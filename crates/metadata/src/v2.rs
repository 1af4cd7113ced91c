use std::io::{Read, Seek, SeekFrom};

use id3::frame::{Content, Unknown};
use id3::{Frame, Tag, TagLike, Version};

use crate::MetadataError;

pub const V2_HEADER_LEN: usize = 10;
const SIGNATURE: &[u8; 3] = b"ID3";
const FLAG_FOOTER: u8 = 0x10;

pub const TITLE_FRAME: &str = "TIT2";
pub const ARTIST_FRAME: &str = "TPE1";
pub const ALBUM_FRAME: &str = "TALB";
pub const TRACK_FRAME: &str = "TRCK";
pub const YEAR_FRAME: &str = "TYER";
pub const RECORDING_TIME_FRAME: &str = "TDRC";
pub const GENRE_FRAME: &str = "TCON";
pub const CD_IDENTIFIER_FRAME: &str = "MCDI";

/// A v2 block read from the start of a track.
#[derive(Clone, Debug)]
pub struct V2Block {
    pub tag: Tag,
    /// Bytes the block occupies at the start of the file, header and footer included.
    pub size_on_disk: usize,
}

impl V2Block {
    /// Reads the block at the start of `reader`; `Ok(None)` when there is none.
    ///
    /// The header is checked before `id3` sees the stream: only majors 3 and 4 are
    /// accepted, and the declared size must fit in what the stream actually holds.
    pub fn read_from<R: Read + Seek>(reader: &mut R) -> Result<Option<Self>, MetadataError> {
        let len = reader.seek(SeekFrom::End(0))?;
        if len < V2_HEADER_LEN as u64 {
            return Ok(None);
        }
        reader.seek(SeekFrom::Start(0))?;
        let mut header = [0u8; V2_HEADER_LEN];
        reader.read_exact(&mut header)?;
        if !header.starts_with(SIGNATURE) {
            return Ok(None);
        }
        let major = header[3];
        if major != 3 && major != 4 {
            return Err(MetadataError::UnsupportedVersion(major));
        }
        let size = synchsafe(&header[6..10])
            .ok_or_else(|| MetadataError::Corrupt("tag size is not synch-safe".to_string()))?;
        let mut size_on_disk = V2_HEADER_LEN + size;
        if major == 4 && header[5] & FLAG_FOOTER != 0 {
            size_on_disk += V2_HEADER_LEN;
        }
        if size_on_disk as u64 > len {
            return Err(MetadataError::Corrupt(format!(
                "tag claims {} bytes but the file holds {}",
                size_on_disk, len
            )));
        }

        reader.seek(SeekFrom::Start(0))?;
        let tag = Tag::read_from2(&mut *reader)?;
        Ok(Some(Self { tag, size_on_disk }))
    }

    pub fn major(&self) -> u8 {
        major_of(self.tag.version())
    }
}

pub fn major_of(version: Version) -> u8 {
    match version {
        Version::Id3v22 => 2,
        Version::Id3v23 => 3,
        Version::Id3v24 => 4,
    }
}

/// Versions other than 2.4 are written as 2.3.
pub fn version_of(major: u8) -> Version {
    if major >= 4 {
        Version::Id3v24
    } else {
        Version::Id3v23
    }
}

/// Text of the first frame named `id`.
pub fn text(tag: &Tag, id: &str) -> Option<String> {
    tag.get(id)
        .and_then(|frame| frame.content().text())
        .map(str::to_owned)
}

/// Replaces the frame named `id`; an empty `value` removes it.
pub fn set_text(tag: &mut Tag, id: &str, value: &str) {
    if value.is_empty() {
        tag.remove(id);
    } else {
        tag.set_text(id, value);
    }
}

pub fn year(tag: &Tag) -> Option<String> {
    text(tag, YEAR_FRAME).or_else(|| text(tag, RECORDING_TIME_FRAME))
}

/// The frame that holds the year: whichever is present, else the one native to the version.
pub fn year_frame_id(tag: &Tag) -> &'static str {
    if tag.get(YEAR_FRAME).is_some() {
        YEAR_FRAME
    } else if tag.get(RECORDING_TIME_FRAME).is_some() || tag.version() == Version::Id3v24 {
        RECORDING_TIME_FRAME
    } else {
        YEAR_FRAME
    }
}

pub fn cd_identifier(tag: &Tag) -> Vec<u8> {
    match tag.get(CD_IDENTIFIER_FRAME).map(Frame::content) {
        Some(Content::Unknown(unknown)) => unknown.data.clone(),
        _ => Vec::new(),
    }
}

/// Empty `data` removes the frame.
pub fn set_cd_identifier(tag: &mut Tag, data: &[u8]) {
    tag.remove(CD_IDENTIFIER_FRAME);
    if data.is_empty() {
        return;
    }
    let version = tag.version();
    tag.add_frame(Frame::with_content(
        CD_IDENTIFIER_FRAME,
        Content::Unknown(Unknown {
            data: data.to_vec(),
            version,
        }),
    ));
}

/// Printable rendition used by diagnostic listings.
pub fn describe(frame: &Frame) -> String {
    match frame.content() {
        Content::Text(value) | Content::Link(value) => value.replace('\0', " / "),
        Content::Comment(comment) => comment.text.clone(),
        Content::ExtendedText(extended) => {
            format!("{}: {}", extended.description, extended.value)
        }
        Content::Unknown(unknown) => format!("<binary data, {} bytes>", unknown.data.len()),
        _ => "<binary data>".to_string(),
    }
}

/// Serializes `tag` in its own version.
pub fn to_bytes(tag: &Tag) -> Result<Vec<u8>, MetadataError> {
    let mut bytes = Vec::new();
    tag.write_to(&mut bytes, version_of(major_of(tag.version())))?;
    Ok(bytes)
}

/// Decodes a 4-byte synch-safe integer; `None` when a high bit is set.
pub fn synchsafe(bytes: &[u8]) -> Option<usize> {
    if bytes.len() != 4 || bytes.iter().any(|b| b & 0x80 != 0) {
        return None;
    }
    Some(
        (usize::from(bytes[0]) << 21)
            | (usize::from(bytes[1]) << 14)
            | (usize::from(bytes[2]) << 7)
            | usize::from(bytes[3]),
    )
}
