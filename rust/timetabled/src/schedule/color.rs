use super::error::ScheduleError;

pub const DEFAULT_PALETTE: [&str; 10] = [
    "#4f46e5", "#0891b2", "#059669", "#65a30d", "#d97706", "#dc2626", "#db2777", "#9333ea",
    "#2563eb", "#0d9488",
];

/// 32-bit rolling hash over UTF-16 code units:
/// `hash = code + (hash << 5) - hash`, wrapping on overflow.
pub fn subject_hash(subject: &str) -> i32 {
    subject.encode_utf16().fold(0i32, |hash, code| {
        i32::from(code)
            .wrapping_add(hash.wrapping_shl(5))
            .wrapping_sub(hash)
    })
}

pub fn color_index(subject: &str, palette_len: usize) -> usize {
    subject_hash(subject).unsigned_abs() as usize % palette_len
}

/// Non-empty list of display colors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<String>,
}

impl Default for Palette {
    fn default() -> Self {
        Palette {
            colors: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Palette {
    pub fn new(colors: Vec<String>) -> Result<Palette, ScheduleError> {
        if colors.is_empty() {
            return Err(ScheduleError::InvalidPalette);
        }
        Ok(Palette { colors })
    }

    pub fn color_of(&self, subject: &str) -> (usize, &str) {
        let idx = color_index(subject, self.colors.len());
        (idx, self.colors[idx].as_str())
    }
}
