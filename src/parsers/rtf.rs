//! RTF markup stripping.
//!
//! A single pass over the raw bytes: destination groups that never hold body
//! text are skipped, paragraph controls become newlines, and `\'hh` escapes
//! are decoded with the document's ANSI code page. Russian documents usually
//! declare `\ansicpg1251`; when they don't but a font uses charset 204 the
//! Cyrillic code page is assumed.

use std::path::Path;

use encoding_rs::{Encoding, UTF_8, WINDOWS_1251, WINDOWS_1252};

use crate::core::errors::{AppError, AppResult};
use crate::core::types::{ExtractedText, UnitKind};

/// Writers emit one or two fallback bytes per `\u`; anything larger would
/// swallow body text.
const MAX_UC_FALLBACK: i32 = 4;

const SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "object",
    "objdata",
    "listtable",
    "listoverridetable",
    "rsidtbl",
    "generator",
    "themedata",
    "colorschememapping",
    "latentstyles",
    "datastore",
    "xmlnstbl",
    "filetbl",
    "revtbl",
    "header",
    "headerl",
    "headerr",
    "headerf",
    "footer",
    "footerl",
    "footerr",
    "footerf",
    "fldinst",
    "datafield",
    "pgdsctbl",
    "protusertbl",
    "defchp",
    "defpap",
    "pnseclvl",
];

const CYRILLIC_CHARSET: i32 = 204;

pub fn parse_rtf(file_path: &Path) -> AppResult<ExtractedText> {
    let bytes = std::fs::read(file_path)
        .map_err(|e| AppError::Io(format!("cannot read RTF: {e}")))?;

    let body = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map(|start| &bytes[start..])
        .unwrap_or(&[]);
    if !body.starts_with(b"{\\rtf") {
        return Err(AppError::Parse("missing {\\rtf header".to_string()));
    }

    let text = strip_rtf(body);
    let units = if text.is_empty() { Vec::new() } else { vec![text] };
    Ok(ExtractedText::new(UnitKind::Blob, units))
}

/// Strip RTF markup into plain text.
pub fn strip_rtf(input: &[u8]) -> String {
    let mut stripper = Stripper::new(input);
    stripper.run();
    stripper.finish()
}

#[derive(Debug, Clone, Copy)]
struct Group {
    skip: bool,
    uc: usize,
}

impl Default for Group {
    fn default() -> Self {
        Self { skip: false, uc: 1 }
    }
}

struct Stripper<'a> {
    input: &'a [u8],
    pos: usize,
    out: String,
    pending: Vec<u8>,
    encoding: &'static Encoding,
    codepage_declared: bool,
    stack: Vec<Group>,
    current: Group,
    fallback_to_skip: usize,
    high_surrogate: Option<u32>,
}

impl<'a> Stripper<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            out: String::with_capacity(input.len() / 2),
            pending: Vec::new(),
            encoding: WINDOWS_1252,
            codepage_declared: false,
            stack: Vec::new(),
            current: Group::default(),
            fallback_to_skip: 0,
            high_surrogate: None,
        }
    }

    fn run(&mut self) {
        while self.pos < self.input.len() {
            let byte = self.input[self.pos];
            match byte {
                b'{' => {
                    self.flush_pending();
                    self.stack.push(self.current);
                    self.pos += 1;
                }
                b'}' => {
                    self.flush_pending();
                    self.current = self.stack.pop().unwrap_or_default();
                    self.pos += 1;
                }
                b'\\' => self.control(),
                b'\r' | b'\n' => self.pos += 1,
                _ => {
                    self.pos += 1;
                    self.text_byte(byte);
                }
            }
        }
        self.flush_pending();
    }

    fn finish(self) -> String {
        let lines: Vec<&str> = self.out.lines().map(str::trim_end).collect();
        lines.join("\n").trim().to_string()
    }

    fn control(&mut self) {
        self.pos += 1;
        let Some(&next) = self.input.get(self.pos) else {
            return;
        };

        if next.is_ascii_alphabetic() {
            let start = self.pos;
            while self.pos < self.input.len() && self.input[self.pos].is_ascii_alphabetic() {
                self.pos += 1;
            }
            let word = String::from_utf8_lossy(&self.input[start..self.pos]).to_string();
            let param = self.read_param();
            if self.input.get(self.pos) == Some(&b' ') {
                self.pos += 1;
            }
            self.control_word(&word, param);
            return;
        }

        self.pos += 1;
        match next {
            b'\'' => {
                let hex = self
                    .input
                    .get(self.pos..self.pos + 2)
                    .and_then(|raw| std::str::from_utf8(raw).ok())
                    .and_then(|raw| u8::from_str_radix(raw, 16).ok());
                if let Some(value) = hex {
                    self.pos += 2;
                    self.text_byte(value);
                }
            }
            b'\\' | b'{' | b'}' => self.text_byte(next),
            b'~' => self.emit_char('\u{a0}'),
            b'_' => self.emit_char('-'),
            b'*' => self.current.skip = true,
            b'\r' | b'\n' => self.emit_char('\n'),
            _ => {}
        }
    }

    fn read_param(&mut self) -> Option<i32> {
        let start = self.pos;
        if self.input.get(self.pos) == Some(&b'-') {
            self.pos += 1;
        }
        while self.pos < self.input.len() && self.input[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        if self.pos == start || (self.pos == start + 1 && self.input[start] == b'-') {
            self.pos = start;
            return None;
        }
        std::str::from_utf8(&self.input[start..self.pos])
            .ok()
            .and_then(|raw| raw.parse().ok())
    }

    fn control_word(&mut self, word: &str, param: Option<i32>) {
        match word {
            "par" | "line" | "sect" | "page" | "row" => self.emit_char('\n'),
            "tab" | "cell" => self.emit_char('\t'),
            "emdash" => self.emit_char('\u{2014}'),
            "endash" => self.emit_char('\u{2013}'),
            "bullet" => self.emit_char('\u{2022}'),
            "lquote" => self.emit_char('\u{2018}'),
            "rquote" => self.emit_char('\u{2019}'),
            "ldblquote" => self.emit_char('\u{201c}'),
            "rdblquote" => self.emit_char('\u{201d}'),
            "emspace" | "enspace" | "qmspace" => self.emit_char(' '),
            "ansicpg" => {
                if let Some(codepage) = param {
                    self.flush_pending();
                    self.encoding = encoding_for_codepage(codepage);
                    self.codepage_declared = true;
                }
            }
            "fcharset" => {
                if param == Some(CYRILLIC_CHARSET) && !self.codepage_declared {
                    self.encoding = WINDOWS_1251;
                }
            }
            "uc" => self.current.uc = param.unwrap_or(1).clamp(0, MAX_UC_FALLBACK) as usize,
            "u" => {
                if let Some(value) = param {
                    let code = if value < 0 { value + 65_536 } else { value };
                    let code = code as u32;
                    self.emit_unicode(code);
                    self.fallback_to_skip = self.current.uc;
                }
            }
            w if SKIPPED_DESTINATIONS.contains(&w) => self.current.skip = true,
            _ => {}
        }
    }

    fn text_byte(&mut self, byte: u8) {
        if self.fallback_to_skip > 0 {
            self.fallback_to_skip -= 1;
            return;
        }
        if self.current.skip {
            return;
        }
        if byte.is_ascii() {
            self.flush_pending();
            self.out.push(byte as char);
        } else {
            self.pending.push(byte);
        }
    }

    fn emit_unicode(&mut self, code: u32) {
        match code {
            0xD800..=0xDBFF => self.high_surrogate = Some(code),
            0xDC00..=0xDFFF => {
                if let Some(high) = self.high_surrogate.take() {
                    let combined = 0x10000 + ((high - 0xD800) << 10) + (code - 0xDC00);
                    if let Some(ch) = char::from_u32(combined) {
                        self.emit_char(ch);
                    }
                }
            }
            _ => {
                self.high_surrogate = None;
                if let Some(ch) = char::from_u32(code) {
                    self.emit_char(ch);
                }
            }
        }
    }

    fn emit_char(&mut self, ch: char) {
        if self.current.skip {
            return;
        }
        self.flush_pending();
        self.out.push(ch);
    }

    fn flush_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let (decoded, _) = self.encoding.decode_without_bom_handling(&self.pending);
        self.out.push_str(&decoded);
        self.pending.clear();
    }
}

fn encoding_for_codepage(codepage: i32) -> &'static Encoding {
    let label = match codepage {
        65001 => return UTF_8,
        866 => "ibm866".to_string(),
        20866 => "koi8-r".to_string(),
        21866 => "koi8-u".to_string(),
        10000 => "macintosh".to_string(),
        10007 => "x-mac-cyrillic".to_string(),
        932 => "shift_jis".to_string(),
        936 => "gbk".to_string(),
        949 => "euc-kr".to_string(),
        950 => "big5".to_string(),
        other => format!("windows-{other}"),
    };
    Encoding::for_label(label.as_bytes()).unwrap_or(WINDOWS_1252)
}
