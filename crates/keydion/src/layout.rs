//! Button-accordion key layout
//!
//! Maps computer keys to layout-relative note indices. Each row of the
//! accordion is a diagonal of minor thirds (three semitones per column),
//! and consecutive rows are shifted up by a whole tone.

use crate::error::LayoutError;
use std::collections::HashMap;

/// Layout-relative note number, before the base note is added
pub type NoteIndex = u16;

/// Semitones between two neighbouring buttons in one row
pub const COLUMN_STEP: NoteIndex = 3;

/// Row offsets of the C-griff layout
pub const C_GRIFF_ROW_OFFSETS: [NoteIndex; 4] = [0, 2, 4, 6];

/// Key rows of the C-griff layout on a US QWERTY keyboard
pub const C_GRIFF_ROWS: [&str; 4] = ["1234567890-=", "qwertyuiop[]", "asdfghjkl;'\\", "zxcvbnm,./"];

/// A single button of the layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Button {
    pub row: usize,
    pub column: usize,
    pub symbol: char,
    pub index: NoteIndex,
}

/// Immutable grid of key symbols plus the per-row note offsets
#[derive(Debug, Clone)]
pub struct KeyLayout {
    rows: Vec<Vec<char>>,
    row_offsets: Vec<NoteIndex>,
    key_map: HashMap<char, NoteIndex>,
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self::c_griff()
    }
}

impl KeyLayout {
    /// Create a layout from rows of key symbols and one offset per row.
    ///
    /// Symbols are stored lowercase. If a symbol appears more than once,
    /// the later position wins in the symbol lookup.
    pub fn new(rows: Vec<Vec<char>>, row_offsets: Vec<NoteIndex>) -> Result<Self, LayoutError> {
        if rows.len() != row_offsets.len() {
            return Err(LayoutError::OffsetCountMismatch {
                rows: rows.len(),
                offsets: row_offsets.len(),
            });
        }
        if rows.iter().all(|row| row.is_empty()) {
            return Err(LayoutError::Empty);
        }
        // Indices grow along a row, so checking the last button covers the row
        for (row, (keys, &offset)) in rows.iter().zip(&row_offsets).enumerate() {
            if let Some(column) = keys.len().checked_sub(1) {
                checked_index(column, offset).ok_or(LayoutError::IndexOverflow { row, column })?;
            }
        }
        Ok(Self::build(rows, row_offsets))
    }

    /// Create a layout from one string per row; whitespace is ignored
    pub fn from_strs<S: AsRef<str>>(rows: &[S], row_offsets: Vec<NoteIndex>) -> Result<Self, LayoutError> {
        let rows = rows
            .iter()
            .map(|row| row.as_ref().chars().filter(|c| !c.is_whitespace()).collect())
            .collect();
        Self::new(rows, row_offsets)
    }

    /// The chromatic C-griff layout
    ///
    /// ```text
    ///  row 0 (+0):  1  2  3  4  5  6  7  8  9  0  -  =
    ///  row 1 (+2):    q  w  e  r  t  y  u  i  o  p  [  ]
    ///  row 2 (+4):      a  s  d  f  g  h  j  k  l  ;  '  \
    ///  row 3 (+6):        z  x  c  v  b  n  m  ,  .  /
    /// ```
    pub fn c_griff() -> Self {
        let rows = C_GRIFF_ROWS.iter().map(|row| row.chars().collect()).collect();
        Self::build(rows, C_GRIFF_ROW_OFFSETS.to_vec())
    }

    fn build(rows: Vec<Vec<char>>, row_offsets: Vec<NoteIndex>) -> Self {
        let rows: Vec<Vec<char>> = rows
            .into_iter()
            .map(|row| row.into_iter().map(|c| c.to_ascii_lowercase()).collect())
            .collect();

        let mut key_map = HashMap::new();
        for (row, keys) in rows.iter().enumerate() {
            for (column, &symbol) in keys.iter().enumerate() {
                key_map.insert(symbol, column as NoteIndex * COLUMN_STEP + row_offsets[row]);
            }
        }

        Self {
            rows,
            row_offsets,
            key_map,
        }
    }

    /// Note index of the button at (row, column)
    pub fn note_index(&self, row: usize, column: usize) -> Result<NoteIndex, LayoutError> {
        match (self.rows.get(row), self.row_offsets.get(row)) {
            (Some(keys), Some(&offset)) if column < keys.len() => {
                Ok(column as NoteIndex * COLUMN_STEP + offset)
            }
            _ => Err(LayoutError::OutOfRange { row, column }),
        }
    }

    /// Note index for a key symbol (case-insensitive)
    pub fn index_for_symbol(&self, c: char) -> Option<NoteIndex> {
        self.key_map.get(&c.to_ascii_lowercase()).copied()
    }

    /// Check if a character is part of the layout
    pub fn is_layout_char(&self, c: char) -> bool {
        self.index_for_symbol(c).is_some()
    }

    pub fn rows(&self) -> &[Vec<char>] {
        &self.rows
    }

    pub fn row_offsets(&self) -> &[NoteIndex] {
        &self.row_offsets
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn row_len(&self, row: usize) -> Option<usize> {
        self.rows.get(row).map(Vec::len)
    }

    /// All buttons, row by row
    pub fn buttons(&self) -> impl Iterator<Item = Button> + '_ {
        self.rows.iter().enumerate().flat_map(move |(row, keys)| {
            keys.iter().enumerate().map(move |(column, &symbol)| Button {
                row,
                column,
                symbol,
                index: column as NoteIndex * COLUMN_STEP + self.row_offsets[row],
            })
        })
    }
}

fn checked_index(column: usize, offset: NoteIndex) -> Option<NoteIndex> {
    NoteIndex::try_from(column).ok()?.checked_mul(COLUMN_STEP)?.checked_add(offset)
}

/// Convert a MIDI note number to a note name
pub fn note_name(note: u8) -> String {
    let names = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    let octave = (note / 12) as i8 - 1;
    let name = names[(note % 12) as usize];
    format!("{}{}", name, octave)
}
