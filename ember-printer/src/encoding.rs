//! GBK encoding utilities for thermal printers
//!
//! Most ESC/POS thermal printers expect GBK text. ASCII maps to single
//! bytes, CJK characters to two, which is also what determines how many
//! columns a character occupies on paper.

/// Encode a string to GBK bytes (unmappable characters become '?')
pub fn encode_gbk(s: &str) -> Vec<u8> {
    let (cow, _, _) = encoding_rs::GBK.encode(s);
    cow.into_owned()
}

/// Get the GBK byte width of a string
///
/// This equals the printed column width: CJK characters occupy two
/// columns, ASCII one.
pub fn gbk_width(s: &str) -> usize {
    let (cow, _, _) = encoding_rs::GBK.encode(s);
    cow.len()
}

/// Truncate a string to fit within a GBK byte width
pub fn truncate_gbk(s: &str, max_width: usize) -> String {
    let mut width = 0;
    let mut result = String::new();
    for c in s.chars() {
        let char_len = gbk_width(c.encode_utf8(&mut [0u8; 4]));
        if width + char_len > max_width {
            break;
        }
        result.push(c);
        width += char_len;
    }
    result
}

/// Pad a string to a specific GBK byte width
///
/// If the string is longer than the width, it will be truncated.
pub fn pad_gbk(s: &str, width: usize, align_right: bool) -> String {
    let current_width = gbk_width(s);
    if current_width >= width {
        return truncate_gbk(s, width);
    }
    let spaces = width - current_width;
    if align_right {
        format!("{}{}", " ".repeat(spaces), s)
    } else {
        format!("{}{}", s, " ".repeat(spaces))
    }
}
