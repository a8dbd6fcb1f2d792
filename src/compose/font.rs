//! Text layer font
//!
//! The invisible layer uses the standard Type1 font Courier with
//! WinAnsiEncoding. It needs no embedding and every glyph has the same
//! advance, so the width of a run depends only on its glyph count.

/// Courier advance width, in em
pub const GLYPH_ADVANCE: f32 = 0.6;

/// Courier ascender above the baseline, in em
pub const ASCENT: f32 = 0.629;

/// Courier descender below the baseline, in em
pub const DESCENT: f32 = 0.157;

/// PostScript name of the text layer font
pub const BASE_FONT: &str = "Courier";

/// Encoding of the text layer font
pub const ENCODING: &str = "WinAnsiEncoding";

/// Encode `text` as WinAnsi bytes, one byte per char
///
/// Characters WinAnsi cannot represent become `?`; whitespace becomes a
/// plain space.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(win_ansi_byte).collect()
}

fn win_ansi_byte(c: char) -> u8 {
    match c {
        ' '..='~' => c as u8,
        '\u{a0}'..='\u{ff}' => c as u32 as u8,
        c if c.is_whitespace() => b' ',
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8a,
        '‹' => 0x8b,
        'Œ' => 0x8c,
        'Ž' => 0x8e,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201c}' => 0x93,
        '\u{201d}' => 0x94,
        '•' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9a,
        '›' => 0x9b,
        'œ' => 0x9c,
        'ž' => 0x9e,
        'Ÿ' => 0x9f,
        _ => b'?',
    }
}
