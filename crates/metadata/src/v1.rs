use crate::genre::{genre_code, genre_name, UNKNOWN_GENRE_CODE};

pub const V1_TRAILER_LEN: usize = 128;
pub const V1_TEXT_LEN: usize = 30;
pub const V1_YEAR_LEN: usize = 4;

const SIGNATURE: &[u8; 3] = b"TAG";
const TITLE: (usize, usize) = (3, 33);
const ARTIST: (usize, usize) = (33, 63);
const ALBUM: (usize, usize) = (63, 93);
const YEAR: (usize, usize) = (93, 97);
const ZERO_BYTE: usize = 125;
const TRACK: usize = 126;
const GENRE: usize = 127;

/// The fixed 128-byte trailer at the end of a track file, edited in place.
///
/// Reading goes through `id3::v1`, which has no writer; this type keeps every
/// byte it is not told to change, comment included.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct V1Trailer {
    bytes: [u8; V1_TRAILER_LEN],
}

impl Default for V1Trailer {
    fn default() -> Self {
        Self::new()
    }
}

impl V1Trailer {
    pub fn new() -> Self {
        let mut bytes = [0u8; V1_TRAILER_LEN];
        bytes[..3].copy_from_slice(SIGNATURE);
        bytes[GENRE] = UNKNOWN_GENRE_CODE;
        Self { bytes }
    }

    /// Returns `None` unless `bytes` is exactly one trailer with the signature.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != V1_TRAILER_LEN || !bytes.starts_with(SIGNATURE) {
            return None;
        }
        let mut trailer = [0u8; V1_TRAILER_LEN];
        trailer.copy_from_slice(bytes);
        Some(Self { bytes: trailer })
    }

    pub fn as_bytes(&self) -> &[u8; V1_TRAILER_LEN] {
        &self.bytes
    }

    pub fn title(&self) -> String {
        self.text(TITLE)
    }

    pub fn artist(&self) -> String {
        self.text(ARTIST)
    }

    pub fn album(&self) -> String {
        self.text(ALBUM)
    }

    pub fn year(&self) -> String {
        self.text(YEAR)
    }

    /// Track number, present only in the v1.1 layout.
    pub fn track(&self) -> Option<u8> {
        if self.bytes[ZERO_BYTE] == 0 && self.bytes[TRACK] != 0 {
            Some(self.bytes[TRACK])
        } else {
            None
        }
    }

    pub fn genre_code(&self) -> u8 {
        self.bytes[GENRE]
    }

    pub fn genre(&self) -> &'static str {
        genre_name(self.bytes[GENRE])
    }

    pub fn set_title(&mut self, value: &str) {
        self.set_text(TITLE, value);
    }

    pub fn set_artist(&mut self, value: &str) {
        self.set_text(ARTIST, value);
    }

    pub fn set_album(&mut self, value: &str) {
        self.set_text(ALBUM, value);
    }

    pub fn set_year(&mut self, value: &str) {
        self.set_text(YEAR, value);
    }

    pub fn set_track(&mut self, value: u8) {
        self.bytes[ZERO_BYTE] = 0;
        self.bytes[TRACK] = value;
    }

    /// Stores the lowest table code whose name matches `name`.
    pub fn set_genre(&mut self, name: &str) {
        self.bytes[GENRE] = genre_code(name);
    }

    fn text(&self, (start, end): (usize, usize)) -> String {
        decode_field(&self.bytes[start..end])
    }

    fn set_text(&mut self, (start, end): (usize, usize), value: &str) {
        let field = &mut self.bytes[start..end];
        field.fill(0);
        for (slot, byte) in field.iter_mut().zip(encode_text(value)) {
            *slot = byte;
        }
    }
}

/// The value a v1 text field of `width` bytes ends up holding for `value`.
pub fn render_field(value: &str, width: usize) -> String {
    let bytes: Vec<u8> = encode_text(value).into_iter().take(width).collect();
    decode_field(&bytes)
}

/// Maps text down to the 8-bit (Latin-1) representation used by v1 trailers.
pub fn encode_text(value: &str) -> Vec<u8> {
    value.chars().map(latin1_byte).collect()
}

fn decode_field(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    let text: String = bytes[..end].iter().map(|b| char::from(*b)).collect();
    text.trim_end_matches([' ', '\0']).to_string()
}

fn latin1_byte(ch: char) -> u8 {
    let code = u32::from(ch);
    if code <= 0xFF {
        return code as u8;
    }
    match ch {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => b'\'',
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => b'"',
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
        | '\u{2212}' => b'-',
        '\u{2026}' | '\u{2022}' => b'.',
        '\u{2044}' => b'/',
        'Ā' | 'Ă' | 'Ą' => b'A',
        'ā' | 'ă' | 'ą' => b'a',
        'Ć' | 'Ĉ' | 'Ċ' | 'Č' => b'C',
        'ć' | 'ĉ' | 'ċ' | 'č' => b'c',
        'Ď' => b'D',
        'ď' | 'đ' => b'd',
        'Đ' => 0xD0,
        'Ē' | 'Ĕ' | 'Ė' | 'Ę' | 'Ě' => b'E',
        'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => b'e',
        'Ĝ' | 'Ğ' | 'Ġ' | 'Ģ' => b'G',
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => b'g',
        'Ĥ' | 'Ħ' => b'H',
        'ĥ' | 'ħ' => b'h',
        'Ĩ' | 'Ī' | 'Ĭ' | 'Į' | 'İ' => b'I',
        'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => b'i',
        'Ĵ' => b'J',
        'ĵ' => b'j',
        'Ķ' => b'K',
        'ķ' => b'k',
        'Ĺ' | 'Ļ' | 'Ľ' | 'Ŀ' | 'Ł' => b'L',
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => b'l',
        'Ń' | 'Ņ' | 'Ň' => b'N',
        'ń' | 'ņ' | 'ň' => b'n',
        'Ō' | 'Ŏ' => b'O',
        'ō' | 'ŏ' => b'o',
        'Ő' => 0xD6,
        'ő' => 0xF6,
        'Œ' => b'O',
        'œ' => b'o',
        'Ŕ' | 'Ŗ' | 'Ř' => b'R',
        'ŕ' | 'ŗ' | 'ř' => b'r',
        'Ś' | 'Ŝ' | 'Ş' | 'Š' => b'S',
        'ś' | 'ŝ' | 'ş' | 'š' => b's',
        'Ţ' | 'Ť' | 'Ŧ' => b'T',
        'ţ' | 'ť' | 'ŧ' => b't',
        'Ũ' | 'Ū' | 'Ŭ' | 'Ů' | 'Ų' => b'U',
        'ũ' | 'ū' | 'ŭ' | 'ů' | 'ų' => b'u',
        'Ű' => 0xDC,
        'ű' => 0xFC,
        'Ŵ' => b'W',
        'ŵ' => b'w',
        'Ŷ' | 'Ÿ' => b'Y',
        'ŷ' => b'y',
        'Ź' | 'Ż' | 'Ž' => b'Z',
        'ź' | 'ż' | 'ž' => b'z',
        _ => b'?',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_signature() {
        assert!(V1Trailer::parse(&[0u8; V1_TRAILER_LEN]).is_none());
        assert!(V1Trailer::parse(b"TAG").is_none());
    }

    #[test]
    fn reads_v11_layout() {
        let mut trailer = V1Trailer::new();
        trailer.set_title("Jump");
        trailer.set_artist("Van Halen");
        trailer.set_album("1984");
        trailer.set_year("1984");
        trailer.set_track(2);
        trailer.set_genre("rock");

        let parsed = V1Trailer::parse(trailer.as_bytes()).unwrap();
        assert_eq!(parsed.title(), "Jump");
        assert_eq!(parsed.artist(), "Van Halen");
        assert_eq!(parsed.album(), "1984");
        assert_eq!(parsed.year(), "1984");
        assert_eq!(parsed.track(), Some(2));
        assert_eq!(parsed.genre_code(), 17);
        assert_eq!(parsed.genre(), "Rock");
    }

    #[test]
    fn trims_space_padding() {
        let mut bytes = *V1Trailer::new().as_bytes();
        bytes[3..33].fill(b' ');
        bytes[3..7].copy_from_slice(b"Song");
        let parsed = V1Trailer::parse(&bytes).unwrap();
        assert_eq!(parsed.title(), "Song");
    }

    #[test]
    fn v10_layout_has_no_track() {
        let mut bytes = *V1Trailer::new().as_bytes();
        bytes[97..127].fill(b'x');
        let parsed = V1Trailer::parse(&bytes).unwrap();
        assert_eq!(parsed.track(), None);
        let mut edited = parsed.clone();
        edited.set_title("x");
        assert_eq!(&edited.as_bytes()[97..127], &bytes[97..127]);
    }

    #[test]
    fn truncates_long_text() {
        let long = "A Very Long Title That Goes On And On";
        let mut trailer = V1Trailer::new();
        trailer.set_title(long);
        assert_eq!(trailer.title(), &long[..V1_TEXT_LEN]);
        assert_eq!(render_field(long, V1_TEXT_LEN), trailer.title());
    }

    #[test]
    fn every_latin1_byte_round_trips() {
        for byte in 1u8..=255 {
            let text = char::from(byte).to_string();
            assert_eq!(encode_text(&text), vec![byte]);
        }
    }

    #[test]
    fn maps_wider_characters_down() {
        assert_eq!(encode_text("Łódź"), vec![b'L', 0xF3, b'd', b'z']);
        assert_eq!(encode_text("\u{2019}"), vec![b'\'']);
        assert_eq!(encode_text("\u{4E2D}"), vec![b'?']);
    }
}
