//! A1-style cell references.

/// Columns in a sheet, `A` to `XFD`.
pub(crate) const MAX_COLUMNS: usize = 16_384;
/// Rows in a sheet.
pub(crate) const MAX_ROWS: usize = 1_048_576;

/// `"A"` is 0, `"Z"` 25, `"AA"` 26. Letters only, case-insensitive, at most `XFD`.
pub(crate) fn col_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    letters
        .chars()
        .try_fold(0usize, |index, letter| {
            let digit = letter.to_ascii_uppercase();
            if digit.is_ascii_uppercase() {
                Some(index * 26 + (digit as u8 - b'A') as usize + 1).filter(|index| *index <= MAX_COLUMNS)
            } else {
                None
            }
        })
        .map(|index| index - 1)
}

/// `"1"` is 0. Rows past the sheet limit are rejected.
pub(crate) fn row_to_index(digits: &str) -> Option<usize> {
    digits.parse::<usize>().ok()?.checked_sub(1).filter(|index| *index < MAX_ROWS)
}

/// `"B3"` is `(2, 1)`: 0-based row and column. `$` markers are ignored.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.replace('$', "");
    let split = reference.find(|character: char| character.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    Some((row_to_index(digits)?, col_to_index(letters)?))
}

/// Number of rows spanned by a range such as `"A1:C20"` or a single `"B2"`.
pub(crate) fn rows_in_range(range: &str) -> Option<u64> {
    let mut bounds = range.split(':');
    let (first, _) = reference_to_index(bounds.next()?)?;
    let last = match bounds.next() {
        Some(reference) => reference_to_index(reference)?.0,
        None => first,
    };
    Some((last.checked_sub(first)? + 1) as u64)
}
